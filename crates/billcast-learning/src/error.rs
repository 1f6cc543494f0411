//! Error types for the billcast-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! - **Data-shape errors** (missing target, no features, non-numeric target,
//!   too few rows) are fatal and are never retried.
//! - **Artifact errors** (missing or corrupt model file) surface as
//!   [`ModelNotFound`](LearningError::ModelNotFound) and
//!   [`Serialization`](LearningError::Serialization).
//! - Errors from the cleaning crate pass through unchanged as
//!   [`Preprocessing`](LearningError::Preprocessing).
//!
//! # Example
//!
//! ```no_run
//! use billcast_learning::{LearningError, TrainerConfig};
//!
//! fn configure() -> Result<TrainerConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = TrainerConfig::builder().n_trees(50).build()?;
//!     Ok(config)
//! }
//! ```

use billcast_processing::PreprocessingError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// The main error type for billcast-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the trainer.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or inference.
    ///
    /// Common causes:
    /// - The target column is not numeric
    /// - The target column still holds missing values
    /// - Too few rows for a non-empty training and held-out partition
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The target column was not found in the batch.
    #[error("Target column '{0}' not found")]
    TargetNotFound(String),

    /// Fitting the forest failed.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// The model artifact was not found.
    ///
    /// Run a training pass first, or point `--model-path` at an existing artifact.
    #[error("Model not found: {path}")]
    ModelNotFound {
        /// The path that was not found.
        path: String,
    },

    /// The batch's feature columns differ from those the model was fitted on.
    ///
    /// Both names and order must match.
    #[error("Feature mismatch: model expects {expected:?}, batch provides {found:?}")]
    FeatureMismatch {
        /// Features recorded in the model.
        expected: Vec<String>,
        /// Features selected from the batch.
        found: Vec<String>,
    },

    /// An error occurred during prediction.
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// The model artifact could not be encoded or decoded.
    ///
    /// A decode failure usually means the file is corrupt or was written by an
    /// incompatible version.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An error raised while cleaning or selecting features.
    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// I/O error during file operations.
    ///
    /// This wraps standard I/O errors that occur during model save/load operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    /// Get error code for host applications.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::FeatureMismatch { .. } => "FEATURE_MISMATCH",
            Self::InferenceError(_) => "INFERENCE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Preprocessing(e) => e.error_code(),
            Self::Polars(_) => "POLARS_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<bincode::Error> for LearningError {
    fn from(err: bincode::Error) -> Self {
        LearningError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LearningError {
    fn from(err: ndarray::ShapeError) -> Self {
        LearningError::InvalidData(format!("feature matrix shape: {}", err))
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;
