use std::path::PathBuf;

use burn::{config::ConfigError, record::RecorderError};

/// Errors reported by the training and inference entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("model not found at '{0}', train a model before calling inference")]
    MissingCheckpoint(PathBuf),

    #[error("can not find image file '{0}'")]
    MissingImage(PathBuf),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("invalid gpu device id '{0}', expected an integer such as 0")]
    InvalidGpu(String),

    #[error("can not decode '{path}' as a grayscale image: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("expected a {expected_width}x{expected_height} image, got {width}x{height}")]
    ImageSize {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("model record: {0}")]
    Recorder(#[from] RecorderError),

    #[error("training config: {0}")]
    Config(#[from] ConfigError),

    #[error("training history: {0}")]
    History(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
