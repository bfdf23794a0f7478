//! Segmentation layer: resolve a pretrained model, normalize planes, run the
//! network, and turn star-convex polygon predictions into instance labels.

pub mod model;
pub mod nms;
pub mod normalize;
pub mod predict;
pub mod registry;
