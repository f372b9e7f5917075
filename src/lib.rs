//! Booking cancellation training pipeline
//!
//! Three stages hand files to one another through fixed artifact paths:
//!
//! - [`ingestion`] - fetch the raw CSV from object storage and split it
//! - [`preprocessing`] - clean, encode, de-skew, balance and select features
//! - [`training`] - randomized search over a gradient-boosted classifier,
//!   evaluation and persistence
//!
//! [`pipeline::TrainingPipeline`] runs them in order from one
//! [`config::PipelineConfig`].

pub mod config;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod optimizer;
pub mod pipeline;
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod utils;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ArtifactPaths, PipelineConfig, ScoringMetric, StorageConfig};
    pub use crate::error::{PipelineError, Result};
    pub use crate::export::{ModelArtifact, ModelMetadata};
    pub use crate::ingestion::{DataIngestion, GcsObjectStore, LocalObjectStore, ObjectStore};
    pub use crate::pipeline::TrainingPipeline;
    pub use crate::preprocessing::{DataProcessor, FeatureSelector, LabelEncoder, SkewCorrector};
    pub use crate::synthetic::{Sampler, SMOTE};
    pub use crate::training::{EvaluationMetrics, GradientBoostingClassifier, ModelTrainer};
}
