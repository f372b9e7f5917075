//! Error types for the booking pipeline
//!
//! Each stage reports failures through its own domain variant
//! (`IngestionError`, `ConfigError`, `PreprocessingError`, `TrainingError`)
//! which keeps the underlying cause reachable through `source()`.

use thiserror::Error;

/// Boxed cause carried by the stage-level variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Ingestion error: {message}")]
    IngestionError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Preprocessing error: {message}")]
    PreprocessingError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Training error: {message}")]
    TrainingError {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl PipelineError {
    /// Ingestion failure wrapping its cause
    pub fn ingestion(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::IngestionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Configuration failure without an underlying cause
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    /// Configuration failure wrapping its cause
    pub fn config_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::ConfigError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Preprocessing failure wrapping its cause
    pub fn preprocessing(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::PreprocessingError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Training failure wrapping its cause
    pub fn training(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::TrainingError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_ingestion(&self) -> bool {
        matches!(self, PipelineError::IngestionError { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, PipelineError::ConfigError { .. })
    }

    pub fn is_preprocessing(&self) -> bool {
        matches!(self, PipelineError::PreprocessingError { .. })
    }

    pub fn is_training(&self) -> bool {
        matches!(self, PipelineError::TrainingError { .. })
    }

    /// Walk the `source()` chain and report whether any link is a configuration error
    pub fn caused_by_config(&self) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(pe) = err.downcast_ref::<PipelineError>() {
                if pe.is_config() {
                    return true;
                }
            }
            current = err.source();
        }
        false
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
