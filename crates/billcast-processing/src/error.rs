//! Custom error types for the cleaning pipeline.
//!
//! Per-value conversion failures (an unparsable timestamp, a charge that is
//! not a number) never show up here: they become missing values and are dealt
//! with by the filter stage. What remains are structural problems with the
//! batch as a whole, configuration mistakes, and I/O.
//!
//! Errors are serializable so that a host application can forward them as a
//! `{ code, message }` pair.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum PreprocessingError {
    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The resolved target column is not present in the batch.
    #[error("Missing target column: {0}")]
    TargetNotFound(String),

    /// No numeric feature columns remain once the target is excluded.
    #[error("No numeric feature columns found to train on (target: '{target}')")]
    NoFeatures { target: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A cleaning step failed for a structural reason.
    #[error("Failed to clean data: {0}")]
    CleaningFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PreprocessingError>,
    },
}

impl PreprocessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PreprocessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for host applications.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::TargetNotFound(_) => "TARGET_NOT_FOUND",
            Self::NoFeatures { .. } => "NO_FEATURES",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::CleaningFailed(_) => "CLEANING_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether this is a data-shape error: the batch cannot feed a model as
    /// configured. These are caller mistakes and are never retried.
    pub fn is_data_shape(&self) -> bool {
        match self {
            Self::TargetNotFound(_) | Self::NoFeatures { .. } | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_data_shape(),
            _ => false,
        }
    }
}

/// Serialize as a struct with `code` and `message` fields.
impl Serialize for PreprocessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PreprocessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, PreprocessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PreprocessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PreprocessingError::TargetNotFound("Water_Bill_Amount".to_string()).error_code(),
            "TARGET_NOT_FOUND"
        );
        assert_eq!(
            PreprocessingError::NoFeatures {
                target: "x".to_string()
            }
            .error_code(),
            "NO_FEATURES"
        );
    }

    #[test]
    fn test_is_data_shape() {
        assert!(PreprocessingError::TargetNotFound("t".to_string()).is_data_shape());
        assert!(
            PreprocessingError::NoFeatures {
                target: "t".to_string()
            }
            .is_data_shape()
        );
        assert!(!PreprocessingError::InvalidConfig("bad".to_string()).is_data_shape());
    }

    #[test]
    fn test_error_serialization() {
        let error = PreprocessingError::TargetNotFound("Water_Bill_Amount".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("TARGET_NOT_FOUND"));
        assert!(json.contains("Water_Bill_Amount"));
    }

    #[test]
    fn test_with_context() {
        let error = PreprocessingError::TargetNotFound("Water_Bill_Amount".to_string())
            .with_context("During feature selection");
        assert!(error.to_string().contains("During feature selection"));
        assert_eq!(error.error_code(), "TARGET_NOT_FOUND");
        assert!(error.is_data_shape());
    }
}
