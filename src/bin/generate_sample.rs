//! Writes a small synthetic OME-Zarr hierarchy for offline runs: a
//! two-channel stack of blob-like nuclei at `/0` plus sparse curated labels
//! at `/labels/0`, annotated on every fourth z plane.

use std::sync::Arc;

use ndarray::Array5;
use zarrs::array::codec::GzipCodec;
use zarrs::array::{data_type, ArrayBuilder, FillValue};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;
use zarrs::storage::ReadableWritableListableStorage;

const T: usize = 1;
const C: usize = 2;
const Z: usize = 16;
const Y: usize = 128;
const X: usize = 128;

fn gaussian(dy: f64, dx: f64, sigma: f64) -> f64 {
    (-(dy * dy + dx * dx) / (2.0 * sigma * sigma)).exp()
}

struct Cell {
    cy: f64,
    cx: f64,
    sigma: f64,
}

fn plane_cells(rng: &mut SimpleRng, count: usize) -> Vec<Cell> {
    (0..count)
        .map(|_| Cell {
            cy: 8.0 + rng.next_f64() * (Y as f64 - 16.0),
            cx: 8.0 + rng.next_f64() * (X as f64 - 16.0),
            sigma: 3.0 + rng.next_f64() * 3.0,
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample.zarr".to_string());
    let mut rng = SimpleRng::new(42);

    // Synthesize the intensity stack and the sparse labels in memory.
    let mut image = Array5::<u16>::zeros((T, C, Z, Y, X));
    let mut labels = Array5::<u16>::zeros((T, 1, Z, Y, X));
    let mut annotated = 0;
    for z in 0..Z {
        let cells = plane_cells(&mut rng, 10);
        for y in 0..Y {
            for x in 0..X {
                let mut nuclei = rng.gauss(400.0, 40.0).max(0.0);
                let mut stain = rng.gauss(250.0, 30.0).max(0.0);
                for cell in &cells {
                    let g = gaussian(y as f64 - cell.cy, x as f64 - cell.cx, cell.sigma);
                    nuclei += 20000.0 * g;
                    stain += 6000.0 * g;
                }
                image[[0, 0, z, y, x]] = nuclei.min(65535.0) as u16;
                image[[0, 1, z, y, x]] = stain.min(65535.0) as u16;
            }
        }

        // Curate every fourth plane: paint a disk per cell.
        if z % 4 == 0 {
            for (id, cell) in cells.iter().enumerate() {
                let radius = 1.5 * cell.sigma;
                let y0 = (cell.cy - radius).floor().max(0.0) as usize;
                let y1 = ((cell.cy + radius).ceil() as usize).min(Y - 1);
                let x0 = (cell.cx - radius).floor().max(0.0) as usize;
                let x1 = ((cell.cx + radius).ceil() as usize).min(X - 1);
                for y in y0..=y1 {
                    for x in x0..=x1 {
                        let dy = y as f64 - cell.cy;
                        let dx = x as f64 - cell.cx;
                        if dy * dy + dx * dx <= radius * radius {
                            labels[[0, 0, z, y, x]] = (id + 1) as u16;
                        }
                    }
                }
            }
            annotated += 1;
        }
    }

    // Write the hierarchy: root and labels groups, one array each.
    let store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(&path).expect("Failed to create store"));
    GroupBuilder::new()
        .build(store.clone(), "/")
        .expect("Failed to build root group")
        .store_metadata()
        .expect("Failed to write root group metadata");
    GroupBuilder::new()
        .build(store.clone(), "/labels")
        .expect("Failed to build labels group")
        .store_metadata()
        .expect("Failed to write labels group metadata");

    let image_array = ArrayBuilder::new(
        vec![T as u64, C as u64, Z as u64, Y as u64, X as u64],
        data_type::uint16(),
        vec![1, 1, 1, 64, 64].try_into().expect("chunk shape"),
        FillValue::from(0u16),
    )
    .bytes_to_bytes_codecs(vec![Arc::new(
        GzipCodec::new(5).expect("gzip compression level"),
    )])
    .dimension_names(["t", "c", "z", "y", "x"].into())
    .build(store.clone(), "/0")
    .expect("Failed to build image array");
    image_array
        .store_metadata()
        .expect("Failed to write image metadata");
    image_array
        .store_array_subset_ndarray::<u16, _>(&[0, 0, 0, 0, 0], image)
        .expect("Failed to write image chunks");

    let label_array = ArrayBuilder::new(
        vec![T as u64, 1, Z as u64, Y as u64, X as u64],
        data_type::uint16(),
        vec![1, 1, 1, 64, 64].try_into().expect("chunk shape"),
        FillValue::from(0u16),
    )
    .bytes_to_bytes_codecs(vec![Arc::new(
        GzipCodec::new(5).expect("gzip compression level"),
    )])
    .dimension_names(["t", "c", "z", "y", "x"].into())
    .build(store.clone(), "/labels/0")
    .expect("Failed to build label array");
    label_array
        .store_metadata()
        .expect("Failed to write label metadata");
    label_array
        .store_array_subset_ndarray::<u16, _>(&[0, 0, 0, 0, 0], labels)
        .expect("Failed to write label chunks");

    println!(
        "Wrote a {C}-channel {Z}x{Y}x{X} stack with {annotated} curated planes to {path}"
    );
}
