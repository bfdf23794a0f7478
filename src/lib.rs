//! Compare curated and predicted instance labels over a microscopy volume.
//!
//! The pipeline fetches a 5D (t, c, z, y, x) OME-Zarr image and its curated
//! label hierarchy, runs a pretrained star-convex segmentation model over
//! every z plane of one (timepoint, channel), and serves the result to an
//! interactive side-by-side viewer or to a PNG/CSV export.

pub mod app;
pub mod cli;
pub mod color;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod progress;
pub mod seg;
pub mod state;
pub mod ui;

pub use error::{Error, Result};
