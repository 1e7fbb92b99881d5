//! Error types for the insurance modelling runner

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for modelling operations
pub type Result<T> = std::result::Result<T, ModellingError>;

/// Main error type for loading, training and tracking
#[derive(Error, Debug)]
pub enum ModellingError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Parameter '{key}' already logged as '{existing}', refusing to overwrite with '{new}'")]
    ParamConflict {
        key: String,
        existing: String,
        new: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ModellingError {
    /// Shorthand for an [`ModellingError::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ModellingError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for ModellingError {
    fn from(err: polars::error::PolarsError) -> Self {
        ModellingError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ModellingError {
    fn from(err: serde_json::Error) -> Self {
        ModellingError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ModellingError {
    fn from(err: serde_yaml::Error) -> Self {
        ModellingError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ModellingError {
    fn from(err: ndarray::ShapeError) -> Self {
        ModellingError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
