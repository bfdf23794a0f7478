//! Plane-by-plane segmentation of a volume

use crate::data::volume::{PredictionSet, Volume};
use crate::error::Result;
use crate::seg::model::StarConvexModel;
use crate::seg::nms;
use crate::seg::normalize;

/// Segment every z plane of one (t, c) slice stack.
///
/// Each plane is percentile-normalized, passed through the network, and
/// post-processed into instance labels. `progress` receives (planes done,
/// planes total, objects found on the latest plane).
pub fn predict_volume<F>(
    model: &mut StarConvexModel,
    volume: &Volume,
    t: usize,
    c: usize,
    mut progress: F,
) -> Result<PredictionSet>
where
    F: FnMut(usize, usize, usize),
{
    let dims = *volume.dims();
    let config = model.config().clone();
    let mut predictions = PredictionSet::new();
    for z in 0..dims.z {
        let plane = volume.plane(t, c, z)?;
        let normed = normalize::normalize_plane(
            &plane,
            config.norm_percentiles[0],
            config.norm_percentiles[1],
        );
        let prediction = model.predict_plane(&normed.view())?;
        let (labels, objects) = nms::instances(
            &prediction.prob.view(),
            &prediction.dist.view(),
            config.grid,
            config.prob_thresh,
            config.nms_thresh,
            (dims.y, dims.x),
        );
        log::debug!("z={z}: {objects} objects");
        predictions.insert(t, z, labels, objects);
        progress(z + 1, dims.z, objects);
    }
    Ok(predictions)
}
