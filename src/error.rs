use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the data, segmentation, and export layers.
///
/// The application boundary (CLI / UI handlers) wraps these with `anyhow`
/// context; inside the crate they stay typed so tests can match on them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid source data: {0}")]
    InvalidSource(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unsupported array data type '{0}'")]
    UnsupportedDataType(String),

    #[error("requested {axis} index {index} is out of range (extent {extent})")]
    AxisOutOfRange {
        axis: &'static str,
        index: usize,
        extent: usize,
    },

    #[error("unknown model '{name}' (available: {available})")]
    UnknownModel { name: String, available: String },

    #[error("model produced an invalid output: {0}")]
    ModelOutput(String),

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("failed to write '{path}': {source}")]
    ExportWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),

    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),

    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),

    #[error(transparent)]
    Inference(#[from] ort::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource(message.into())
    }

    pub fn shape_mismatch(message: impl Into<String>) -> Self {
        Self::ShapeMismatch(message.into())
    }
}
