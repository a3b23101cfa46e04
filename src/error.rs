use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to open dataset: {0}")]
    Open(String),

    #[error("Failed to create dataset: {0}")]
    Create(String),

    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    #[error("Clipping failed: {0}")]
    Clip(String),

    #[error("CRS error: {0}")]
    Crs(String),

    #[error("Invalid scale factor: {0} (must be positive and not 1.0)")]
    InvalidScaleFactor(f64),

    #[error("Band I/O error: {0}")]
    BandIo(String),

    #[error("Band data length {actual} does not match window size {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid pipeline state: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
