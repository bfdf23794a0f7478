//! ONNX inference producing per-cell object probabilities and radial distances

use std::path::Path;

use ndarray::{s, Array2, Array3, Array4, ArrayView2, ArrayViewD, Axis, Ix3};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::error::{Error, Result};
use crate::seg::registry::{Axes, PredictConfig};

// ---------------------------------------------------------------------------
// Network output
// ---------------------------------------------------------------------------

/// Raw network output for one plane, on the prediction grid: a probability
/// per cell and `n_rays` radial distances per cell, channels last.
#[derive(Debug, Clone)]
pub struct PlanePrediction {
    pub prob: Array2<f32>,
    pub dist: Array3<f32>,
}

// ---------------------------------------------------------------------------
// Session wrapper
// ---------------------------------------------------------------------------

/// A loaded star-convex segmentation network.
pub struct StarConvexModel {
    session: Session,
    config: PredictConfig,
}

impl StarConvexModel {
    /// Load ONNX weights from disk.
    pub fn load(weights: &Path, config: PredictConfig) -> Result<Self> {
        let threads = std::thread::available_parallelism().map_or(1, usize::from);
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(weights)?;
        log::info!(
            "loaded model from {} ({} inputs, {} outputs)",
            weights.display(),
            session.inputs.len(),
            session.outputs.len()
        );
        Ok(Self { session, config })
    }

    pub const fn config(&self) -> &PredictConfig {
        &self.config
    }

    /// Run the network on one normalized plane.
    ///
    /// The plane is zero-padded up to a multiple of `div_by` before the
    /// forward pass and the grid output is cropped back to the cells covering
    /// the original extent.
    pub fn predict_plane(&mut self, plane: &ArrayView2<'_, f32>) -> Result<PlanePrediction> {
        let (h, w) = plane.dim();
        let padded = pad_to_divisible(plane, self.config.div_by);
        let input = pack_input(&padded.view(), self.config.axes);

        let output_names: Vec<String> = self
            .session
            .outputs
            .iter()
            .map(|o| o.name.clone())
            .collect();
        let outputs = self.session.run(ort::inputs![input.view()]?)?;

        let mut grids = Vec::with_capacity(output_names.len());
        for name in &output_names {
            let tensor: ArrayViewD<'_, f32> = outputs[name.as_str()].try_extract_tensor::<f32>()?;
            grids.push(unpack_output(&tensor, self.config.axes)?);
        }
        let (prob, dist) = classify_outputs(grids, self.config.n_rays)?;

        // Cells covering the unpadded plane
        let gy = h.div_ceil(self.config.grid[0]);
        let gx = w.div_ceil(self.config.grid[1]);
        if prob.dim().0 < gy || prob.dim().1 < gx {
            return Err(Error::ModelOutput(format!(
                "grid {:?} too small for a {h}x{w} plane with stride {:?}",
                prob.dim(),
                self.config.grid
            )));
        }
        Ok(PlanePrediction {
            prob: prob.slice(s![..gy, ..gx]).to_owned(),
            dist: dist.slice(s![..gy, ..gx, ..]).to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tensor packing
// ---------------------------------------------------------------------------

/// Zero-pad a plane on the bottom/right so both extents divide evenly.
pub fn pad_to_divisible(plane: &ArrayView2<'_, f32>, div_by: usize) -> Array2<f32> {
    let (h, w) = plane.dim();
    let ph = h.div_ceil(div_by) * div_by;
    let pw = w.div_ceil(div_by) * div_by;
    if (ph, pw) == (h, w) {
        return plane.to_owned();
    }
    let mut padded = Array2::<f32>::zeros((ph, pw));
    padded.slice_mut(s![..h, ..w]).assign(plane);
    padded
}

/// Add batch and singleton channel axes in the model's layout.
pub fn pack_input(plane: &ArrayView2<'_, f32>, axes: Axes) -> Array4<f32> {
    let batched = plane.to_owned().insert_axis(Axis(0));
    match axes {
        Axes::Nhwc => batched.insert_axis(Axis(3)),
        Axes::Nchw => batched.insert_axis(Axis(1)),
    }
}

/// Strip the batch axis and move channels last, yielding (gy, gx, k).
pub fn unpack_output(tensor: &ArrayViewD<'_, f32>, axes: Axes) -> Result<Array3<f32>> {
    if tensor.ndim() != 4 || tensor.shape()[0] != 1 {
        return Err(Error::ModelOutput(format!(
            "expected a single-batch 4d output, got shape {:?}",
            tensor.shape()
        )));
    }
    let unbatched = tensor.index_axis(Axis(0), 0);
    let channels_last = match axes {
        Axes::Nhwc => unbatched.to_owned(),
        Axes::Nchw => unbatched.permuted_axes([1, 2, 0]).to_owned(),
    };
    channels_last
        .into_dimensionality::<Ix3>()
        .map_err(|e| Error::ModelOutput(format!("output dimensionality: {e}")))
}

/// Identify the probability and distance outputs by channel count: the
/// probability head has one channel, the distance head has `n_rays`.
pub fn classify_outputs(
    grids: Vec<Array3<f32>>,
    n_rays: usize,
) -> Result<(Array2<f32>, Array3<f32>)> {
    let shapes: Vec<_> = grids.iter().map(|g| g.dim()).collect();
    let mut prob = None;
    let mut dist = None;
    for grid in grids {
        let channels = grid.dim().2;
        if channels == 1 && prob.is_none() {
            prob = Some(grid.index_axis(Axis(2), 0).to_owned());
        } else if channels == n_rays && dist.is_none() {
            dist = Some(grid);
        }
    }
    match (prob, dist) {
        (Some(p), Some(d)) => Ok((p, d)),
        _ => Err(Error::ModelOutput(format!(
            "expected outputs with 1 and {n_rays} channels, got shapes {shapes:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn padding_rounds_up_to_the_divisor() {
        let plane = Array2::<f32>::from_elem((5, 7), 1.0);
        let padded = pad_to_divisible(&plane.view(), 4);
        assert_eq!(padded.dim(), (8, 8));
        assert_eq!(padded[[4, 6]], 1.0);
        assert_eq!(padded[[5, 0]], 0.0);
        assert_eq!(padded[[0, 7]], 0.0);

        // already divisible extents are untouched
        let exact = Array2::<f32>::zeros((8, 16));
        assert_eq!(pad_to_divisible(&exact.view(), 8).dim(), (8, 16));
    }

    #[test]
    fn packing_follows_the_layout() {
        let plane = Array2::<f32>::zeros((6, 9));
        assert_eq!(pack_input(&plane.view(), Axes::Nhwc).dim(), (1, 6, 9, 1));
        assert_eq!(pack_input(&plane.view(), Axes::Nchw).dim(), (1, 1, 6, 9));
    }

    #[test]
    fn unpacking_moves_channels_last() {
        let mut nchw = Array4::<f32>::zeros((1, 3, 4, 5));
        nchw[[0, 2, 1, 4]] = 9.0;
        let unpacked = unpack_output(&nchw.view().into_dyn(), Axes::Nchw).unwrap();
        assert_eq!(unpacked.dim(), (4, 5, 3));
        assert_eq!(unpacked[[1, 4, 2]], 9.0);

        let mut nhwc = Array4::<f32>::zeros((1, 4, 5, 3));
        nhwc[[0, 1, 4, 2]] = 9.0;
        let unpacked = unpack_output(&nhwc.view().into_dyn(), Axes::Nhwc).unwrap();
        assert_eq!(unpacked[[1, 4, 2]], 9.0);
    }

    #[test]
    fn batched_outputs_are_rejected() {
        let batched = Array4::<f32>::zeros((2, 4, 5, 3));
        assert!(unpack_output(&batched.view().into_dyn(), Axes::Nhwc).is_err());
    }

    #[test]
    fn outputs_are_classified_by_channel_count() {
        let prob = Array3::<f32>::zeros((4, 5, 1));
        let dist = Array3::<f32>::zeros((4, 5, 32));
        // order independent
        let (p, d) = classify_outputs(vec![dist.clone(), prob.clone()], 32).unwrap();
        assert_eq!(p.dim(), (4, 5));
        assert_eq!(d.dim(), (4, 5, 32));

        let err = classify_outputs(vec![prob], 32).unwrap_err();
        assert!(err.to_string().contains("32"));
    }
}
