//! In-memory volumes with (t, c, z, y, x) axis order

use ndarray::{Array2, Array5, ArrayView2, Axis};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Extents of a five-dimensional image, ordered (t, c, z, y, x).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub t: usize,
    pub c: usize,
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

impl Dims {
    /// Interpret an array shape as (t, c, z, y, x) extents.
    pub fn from_shape(shape: &[u64]) -> Result<Self> {
        if shape.len() != 5 {
            return Err(Error::shape_mismatch(format!(
                "expected a 5-dimensional (t, c, z, y, x) array, got shape {shape:?}"
            )));
        }
        Ok(Self {
            t: shape[0] as usize,
            c: shape[1] as usize,
            z: shape[2] as usize,
            y: shape[3] as usize,
            x: shape[4] as usize,
        })
    }

    /// Total number of (t, c, z) planes.
    pub fn plane_count(&self) -> usize {
        self.t * self.c * self.z
    }

    fn check(&self, axis: &'static str, index: usize, extent: usize) -> Result<()> {
        if index >= extent {
            return Err(Error::AxisOutOfRange {
                axis,
                index,
                extent,
            });
        }
        Ok(())
    }

    /// Validate a (t, c, z) plane coordinate against these extents.
    pub fn check_plane(&self, t: usize, c: usize, z: usize) -> Result<()> {
        self.check("t", t, self.t)?;
        self.check("c", c, self.c)?;
        self.check("z", z, self.z)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Intensity volume
// ---------------------------------------------------------------------------

/// Dense intensity data converted to `f32` at load time.
#[derive(Debug, Clone)]
pub struct Volume {
    dims: Dims,
    data: Array5<f32>,
}

impl Volume {
    pub fn new(data: Array5<f32>) -> Self {
        let (t, c, z, y, x) = data.dim();
        Self {
            dims: Dims { t, c, z, y, x },
            data,
        }
    }

    pub const fn dims(&self) -> &Dims {
        &self.dims
    }

    /// Borrow one (y, x) plane.
    pub fn plane(&self, t: usize, c: usize, z: usize) -> Result<ArrayView2<'_, f32>> {
        self.dims.check_plane(t, c, z)?;
        Ok(self
            .data
            .index_axis(Axis(0), t)
            .index_axis(Axis(0), c)
            .index_axis(Axis(0), z))
    }

    pub fn as_array(&self) -> &Array5<f32> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array5<f32> {
        &mut self.data
    }
}

// ---------------------------------------------------------------------------
// Curated label volume
// ---------------------------------------------------------------------------

/// Curated instance labels. Annotation is sparse along z: a plane either
/// carries a full label image or nothing at all, and the channel axis is
/// usually a singleton shared by every image channel.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    dims: Dims,
    data: Array5<u32>,
    /// (t, z) coordinates of planes containing at least one labelled pixel.
    curated: BTreeSet<(usize, usize)>,
}

impl LabelVolume {
    pub fn new(data: Array5<u32>) -> Self {
        let (t, c, z, y, x) = data.dim();
        let dims = Dims { t, c, z, y, x };
        let mut curated = BTreeSet::new();
        for ti in 0..t {
            for zi in 0..z {
                let any = (0..c).any(|ci| {
                    data.index_axis(Axis(0), ti)
                        .index_axis(Axis(0), ci)
                        .index_axis(Axis(0), zi)
                        .iter()
                        .any(|&v| v != 0)
                });
                if any {
                    curated.insert((ti, zi));
                }
            }
        }
        Self {
            dims,
            data,
            curated,
        }
    }

    pub const fn dims(&self) -> &Dims {
        &self.dims
    }

    /// Borrow one (y, x) label plane, or `None` when the plane carries no
    /// annotation. A channel index beyond the label array's extent is clamped
    /// to its last channel, so single-channel labels serve every image
    /// channel.
    pub fn plane(&self, t: usize, c: usize, z: usize) -> Result<Option<ArrayView2<'_, u32>>> {
        let c = c.min(self.dims.c.saturating_sub(1));
        self.dims.check_plane(t, c, z)?;
        if !self.curated.contains(&(t, z)) {
            return Ok(None);
        }
        Ok(Some(
            self.data
                .index_axis(Axis(0), t)
                .index_axis(Axis(0), c)
                .index_axis(Axis(0), z),
        ))
    }

    /// Sorted z indices of annotated planes at a timepoint.
    pub fn curated_planes(&self, t: usize) -> Vec<usize> {
        self.curated
            .iter()
            .filter(|(ti, _)| *ti == t)
            .map(|(_, z)| *z)
            .collect()
    }

    pub fn curated_count(&self) -> usize {
        self.curated.len()
    }
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// One segmented plane: an instance label image plus its object count.
#[derive(Debug, Clone)]
pub struct PredictedPlane {
    pub labels: Array2<u32>,
    pub objects: usize,
}

/// Model output for every processed plane, keyed by (t, z).
#[derive(Debug, Clone, Default)]
pub struct PredictionSet {
    planes: BTreeMap<(usize, usize), PredictedPlane>,
}

impl PredictionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, t: usize, z: usize, labels: Array2<u32>, objects: usize) {
        self.planes.insert((t, z), PredictedPlane { labels, objects });
    }

    pub fn plane(&self, t: usize, z: usize) -> Option<&PredictedPlane> {
        self.planes.get(&(t, z))
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Object counts along z at a timepoint, for plotting and export.
    pub fn counts_over_z(&self, t: usize) -> Vec<(usize, usize)> {
        self.planes
            .iter()
            .filter(|((ti, _), _)| *ti == t)
            .map(|((_, z), plane)| (*z, plane.objects))
            .collect()
    }
}

/// Count distinct nonzero instance ids in a label plane.
pub fn count_objects(plane: &ArrayView2<'_, u32>) -> usize {
    let ids: BTreeSet<u32> = plane.iter().copied().filter(|&v| v != 0).collect();
    ids.len()
}
