use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for label_synth
#[derive(Error, Debug)]
pub enum LabelSynthError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("TIFF encoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Failed to load JSON settings from {path}: {source}")]
    ConfigJson {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Effect '{effect}' failed: {reason}")]
    Effect {
        effect: &'static str,
        reason: String,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, LabelSynthError>;
