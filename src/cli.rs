//! Command-line configuration for the fetch → segment → view pipeline

use clap::Parser;
use std::env;
use std::path::PathBuf;

/// Default public S3 mirror of the Image Data Resource.
pub const DEFAULT_ENDPOINT: &str = "https://uk1s3.embassy.ebi.ac.uk";

/// Default IDR image: a two-channel nuclei stack with sparse curated labels.
pub const DEFAULT_IMAGE_ID: u64 = 6001247;

#[derive(Parser, Debug, Clone)]
#[command(name = "slicescope")]
#[command(
    author,
    version,
    about = "Fetch an OME-Zarr microscopy image, segment every plane with a pretrained model, and compare against curated labels"
)]
pub struct Cli {
    /// IDR image identifier to fetch
    #[arg(long, default_value_t = DEFAULT_IMAGE_ID)]
    pub image_id: u64,

    /// Object-store endpoint hosting the `idr/zarr/v0.1` hierarchy
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Resolution level within the multiscale pyramid
    #[arg(long, default_value_t = 0)]
    pub resolution: u32,

    /// Local OME-Zarr directory to open instead of the remote store
    #[arg(long, value_name = "DIR", conflicts_with_all = ["image_id", "endpoint"])]
    pub local_path: Option<PathBuf>,

    /// Node path of the curated label array (default: labels/<resolution>)
    #[arg(long, value_name = "PATH")]
    pub labels_path: Option<String>,

    /// Pretrained model name resolved through the registry
    #[arg(short, long, default_value = "2D_demo")]
    pub model: String,

    /// Registry index URL overriding the built-in model list
    #[arg(long, value_name = "URL")]
    pub registry_url: Option<String>,

    /// Directory for downloaded model weights (default: XDG cache)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Channel to segment
    #[arg(short, long, default_value_t = 0)]
    pub channel: usize,

    /// Timepoint to segment
    #[arg(short, long, default_value_t = 0)]
    pub timepoint: usize,

    /// Write per-plane PNGs and a summary CSV to this directory
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Skip the interactive viewer (useful together with --export-dir)
    #[arg(long)]
    pub no_gui: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Check if progress bars should be displayed during the pipeline phase.
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Resolve the weight-cache directory, falling back to the XDG layout.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// `$XDG_CACHE_HOME/slicescope`, or `~/.cache/slicescope`, or a relative
/// fallback when neither variable is set.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = env::var("XDG_CACHE_HOME") {
        return PathBuf::from(dir).join("slicescope");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home).join(".cache").join("slicescope");
    }
    PathBuf::from(".slicescope-cache")
}
