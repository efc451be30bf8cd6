//! Error types for neural_polar.

use thiserror::Error;

/// Errors that can occur while training or evaluating a panoptic model.
#[derive(Error, Debug)]
pub enum PolarError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// The first backward pass left no gradient on a sample's point features.
    #[error("no gradient recorded for the point features of sample {sample}")]
    MissingGradient {
        /// Sample index within the batch.
        sample: usize,
    },

    /// The network was built with visibility input but the batch carries none.
    #[error("network expects visibility features but the batch has none")]
    MissingVisibility,

    /// A scan has no source path, so its predictions cannot be placed.
    #[error("scan {index} has no source path")]
    MissingScanPath {
        /// Dataset index of the scan.
        index: usize,
    },

    /// Invalid or inconsistent scan or batch data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Tensor data could not be read back to the host.
    #[error("tensor readback failed: {message}")]
    Tensor {
        /// Description of the failure.
        message: String,
    },

    /// Checkpoint could not be encoded or decoded.
    #[error("checkpoint error: {message}")]
    Checkpoint {
        /// Description of the error.
        message: String,
    },

    /// Cross-worker merge or barrier failed.
    #[error("collective operation failed: {message}")]
    Collective {
        /// Description of the failure.
        message: String,
    },

    /// Error from polar_core (bounds, label or accumulator checks).
    #[error(transparent)]
    Core(#[from] polar_core::PolarCoreError),

    /// Error from polar_io (label files).
    #[error("I/O error: {0}")]
    Io(#[from] polar_io::PolarIoError),

    /// Filesystem error outside label files.
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Checkpoint metadata could not be (de)serialized.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl PolarError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        PolarError::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn collective(message: impl Into<String>) -> Self {
        PolarError::Collective {
            message: message.into(),
        }
    }
}

/// Result type for neural_polar operations.
pub type Result<T> = std::result::Result<T, PolarError>;
