//! From grid predictions to instance labels: candidate polygons, greedy
//! suppression, and painting

use std::f32::consts::TAU;

use ndarray::{s, Array2, ArrayView2, ArrayView3};

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// One thresholded grid cell: a star-convex polygon around the cell center.
#[derive(Debug, Clone)]
struct Candidate {
    prob: f32,
    ys: Vec<f32>,
    xs: Vec<f32>,
}

/// Polygon vertices for one cell. Ray k points at angle `2πk/n` measured
/// from the +x axis towards +y; degenerate distances collapse to a tiny
/// positive radius.
fn polygon_vertices(cy: f32, cx: f32, dist: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let n = dist.len();
    let mut ys = Vec::with_capacity(n);
    let mut xs = Vec::with_capacity(n);
    for (k, &d) in dist.iter().enumerate() {
        let d = if d.is_finite() { d.max(1e-3) } else { 1e-3 };
        let phi = TAU * k as f32 / n as f32;
        ys.push(cy + d * phi.sin());
        xs.push(cx + d * phi.cos());
    }
    (ys, xs)
}

/// Cells whose probability clears the threshold, in scan order.
fn collect_candidates(
    prob: &ArrayView2<'_, f32>,
    dist: &ArrayView3<'_, f32>,
    grid: [usize; 2],
    prob_thresh: f32,
) -> Vec<Candidate> {
    debug_assert_eq!(prob.dim(), (dist.dim().0, dist.dim().1));
    let (cells_y, cells_x) = prob.dim();
    let mut candidates = Vec::new();
    for i in 0..cells_y {
        for j in 0..cells_x {
            let p = prob[[i, j]];
            if !p.is_finite() || p <= prob_thresh {
                continue;
            }
            let cy = (i * grid[0]) as f32;
            let cx = (j * grid[1]) as f32;
            let rays = dist.slice(s![i, j, ..]);
            let rays = rays.as_slice().map_or_else(|| rays.to_vec(), <[f32]>::to_vec);
            let (ys, xs) = polygon_vertices(cy, cx, &rays);
            candidates.push(Candidate { prob: p, ys, xs });
        }
    }
    candidates
}

// ---------------------------------------------------------------------------
// Rasterization
// ---------------------------------------------------------------------------

/// A polygon rasterized onto the pixel grid, clipped to the image extent.
/// Pixels are tested at their centers with even-odd scanline filling.
struct Raster {
    y0: usize,
    x0: usize,
    h: usize,
    w: usize,
    mask: Vec<bool>,
    area: usize,
}

impl Raster {
    fn from_polygon(ys: &[f32], xs: &[f32], shape: (usize, usize)) -> Self {
        let (img_h, img_w) = shape;
        let min = |vals: &[f32]| vals.iter().copied().fold(f32::INFINITY, f32::min);
        let max = |vals: &[f32]| vals.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let y0 = (min(ys).floor().max(0.0) as usize).min(img_h);
        let y1 = (max(ys).ceil().max(0.0) as usize).min(img_h);
        let x0 = (min(xs).floor().max(0.0) as usize).min(img_w);
        let x1 = (max(xs).ceil().max(0.0) as usize).min(img_w);
        let (h, w) = (y1 - y0, x1 - x0);

        let mut mask = vec![false; h * w];
        let mut area = 0usize;
        let mut crossings: Vec<f32> = Vec::with_capacity(ys.len());
        let n = ys.len();
        for r in 0..h {
            let yc = (y0 + r) as f32 + 0.5;
            crossings.clear();
            for k in 0..n {
                let (ya, xa) = (ys[k], xs[k]);
                let (yb, xb) = (ys[(k + 1) % n], xs[(k + 1) % n]);
                // half-open crossing rule: vertices on the scanline count once
                if (ya <= yc) != (yb <= yc) {
                    crossings.push(xa + (yc - ya) / (yb - ya) * (xb - xa));
                }
            }
            crossings.sort_unstable_by(f32::total_cmp);
            for pair in crossings.chunks_exact(2) {
                let col_lo = ((pair[0] - 0.5).ceil() as i64).max(x0 as i64);
                let col_hi = ((pair[1] - 0.5).ceil() as i64).min(x1 as i64);
                for col in col_lo..col_hi {
                    let idx = r * w + (col as usize - x0);
                    if !mask[idx] {
                        mask[idx] = true;
                        area += 1;
                    }
                }
            }
        }
        Self {
            y0,
            x0,
            h,
            w,
            mask,
            area,
        }
    }

    fn contains_local(&self, r: usize, c: usize) -> bool {
        self.mask[r * self.w + c]
    }
}

/// Number of pixels covered by both rasters.
fn intersection_area(a: &Raster, b: &Raster) -> usize {
    let y_lo = a.y0.max(b.y0);
    let y_hi = (a.y0 + a.h).min(b.y0 + b.h);
    let x_lo = a.x0.max(b.x0);
    let x_hi = (a.x0 + a.w).min(b.x0 + b.w);
    if y_lo >= y_hi || x_lo >= x_hi {
        return 0;
    }
    let mut count = 0;
    for y in y_lo..y_hi {
        for x in x_lo..x_hi {
            if a.contains_local(y - a.y0, x - a.x0) && b.contains_local(y - b.y0, x - b.x0) {
                count += 1;
            }
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Suppression and painting
// ---------------------------------------------------------------------------

/// Greedy suppression in descending probability. A candidate is dropped when
/// its pixel overlap with any already-accepted instance, relative to the
/// smaller of the two areas, exceeds the threshold.
fn greedy_suppress(
    mut candidates: Vec<Candidate>,
    shape: (usize, usize),
    nms_thresh: f32,
) -> Vec<Raster> {
    // stable sort keeps scan order among equal probabilities
    candidates.sort_by(|a, b| b.prob.total_cmp(&a.prob));

    let mut accepted: Vec<Raster> = Vec::new();
    for candidate in &candidates {
        let raster = Raster::from_polygon(&candidate.ys, &candidate.xs, shape);
        if raster.area == 0 {
            continue;
        }
        let suppressed = accepted.iter().any(|prev| {
            let inter = intersection_area(prev, &raster);
            inter > 0 && inter as f32 / raster.area.min(prev.area) as f32 > nms_thresh
        });
        if !suppressed {
            accepted.push(raster);
        }
    }
    accepted
}

/// Paint accepted instances with dense ids from 1, in acceptance order.
/// Contested pixels stay with the earlier (higher-probability) instance.
fn paint(accepted: &[Raster], shape: (usize, usize)) -> Array2<u32> {
    let mut labels = Array2::<u32>::zeros(shape);
    for (index, raster) in accepted.iter().enumerate() {
        let id = (index + 1) as u32;
        for r in 0..raster.h {
            for c in 0..raster.w {
                if raster.contains_local(r, c) {
                    let cell = &mut labels[[raster.y0 + r, raster.x0 + c]];
                    if *cell == 0 {
                        *cell = id;
                    }
                }
            }
        }
    }
    labels
}

/// Instance labels for one plane from grid predictions. Returns the label
/// image and the number of instances; a plane with no candidate above the
/// probability threshold yields an all-background image.
pub fn instances(
    prob: &ArrayView2<'_, f32>,
    dist: &ArrayView3<'_, f32>,
    grid: [usize; 2],
    prob_thresh: f32,
    nms_thresh: f32,
    shape: (usize, usize),
) -> (Array2<u32>, usize) {
    let candidates = collect_candidates(prob, dist, grid, prob_thresh);
    let accepted = greedy_suppress(candidates, shape, nms_thresh);
    let labels = paint(&accepted, shape);
    let count = accepted.len();
    (labels, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn uniform_dist(cells: (usize, usize), n_rays: usize, radius: f32) -> Array3<f32> {
        Array3::from_elem((cells.0, cells.1, n_rays), radius)
    }

    #[test]
    fn ray_zero_points_along_positive_x() {
        let (ys, xs) = polygon_vertices(10.0, 20.0, &[4.0; 8]);
        assert!((xs[0] - 24.0).abs() < 1e-5);
        assert!((ys[0] - 10.0).abs() < 1e-5);
        // quarter turn reaches +y
        assert!((ys[2] - 14.0).abs() < 1e-5);
        assert!((xs[2] - 20.0).abs() < 1e-4);
    }

    #[test]
    fn square_rasterizes_to_its_pixel_area() {
        let ys = [0.0, 0.0, 4.0, 4.0];
        let xs = [0.0, 4.0, 4.0, 0.0];
        let raster = Raster::from_polygon(&ys, &xs, (10, 10));
        assert_eq!(raster.area, 16);

        // clipping against the image extent shrinks the mask
        let clipped = Raster::from_polygon(&ys, &xs, (3, 10));
        assert_eq!(clipped.area, 12);
    }

    #[test]
    fn below_threshold_cells_produce_nothing() {
        let prob = Array2::from_elem((4, 4), 0.2_f32);
        let dist = uniform_dist((4, 4), 8, 3.0);
        let (labels, count) =
            instances(&prob.view(), &dist.view(), [2, 2], 0.5, 0.5, (8, 8));
        assert_eq!(count, 0);
        assert!(labels.iter().all(|&v| v == 0));
    }

    #[test]
    fn single_candidate_becomes_one_instance() {
        let mut prob = Array2::zeros((4, 4));
        prob[[1, 1]] = 0.9_f32;
        let dist = uniform_dist((4, 4), 16, 2.5);
        let (labels, count) =
            instances(&prob.view(), &dist.view(), [2, 2], 0.5, 0.5, (8, 8));
        assert_eq!(count, 1);
        // center of cell (1, 1) is pixel (2, 2)
        assert_eq!(labels[[2, 2]], 1);
        assert!(labels.iter().all(|&v| v <= 1));
        assert!(labels.iter().any(|&v| v == 1));
    }

    #[test]
    fn heavy_overlap_is_suppressed() {
        let mut prob = Array2::zeros((8, 8));
        prob[[2, 2]] = 0.9_f32; // center (4, 4)
        prob[[2, 3]] = 0.8_f32; // center (4, 6)
        let dist = uniform_dist((8, 8), 16, 4.0);
        let (labels, count) =
            instances(&prob.view(), &dist.view(), [2, 2], 0.5, 0.5, (16, 16));
        assert_eq!(count, 1);
        assert_eq!(labels[[4, 4]], 1);
    }

    #[test]
    fn tolerated_overlap_keeps_both_with_dense_ids() {
        let mut prob = Array2::zeros((8, 8));
        prob[[2, 2]] = 0.9_f32; // center (4, 4)
        prob[[2, 3]] = 0.8_f32; // center (4, 6)
        let dist = uniform_dist((8, 8), 16, 3.0);
        // high tolerance: both survive
        let (labels, count) =
            instances(&prob.view(), &dist.view(), [2, 2], 0.5, 0.95, (16, 16));
        assert_eq!(count, 2);
        // contested pixel between the centers stays with the stronger one
        assert_eq!(labels[[4, 5]], 1);
        assert_eq!(labels[[4, 7]], 2);
    }

    #[test]
    fn disjoint_candidates_coexist() {
        let mut prob = Array2::zeros((8, 8));
        prob[[1, 1]] = 0.6_f32; // center (2, 2)
        prob[[1, 6]] = 0.9_f32; // center (2, 12)
        let dist = uniform_dist((8, 8), 16, 2.0);
        let (labels, count) =
            instances(&prob.view(), &dist.view(), [2, 2], 0.5, 0.5, (16, 16));
        assert_eq!(count, 2);
        // ids follow descending probability, not scan order
        assert_eq!(labels[[2, 12]], 1);
        assert_eq!(labels[[2, 2]], 2);
    }
}
