//! Model persistence

mod serializer;

pub use serializer::{load_model, save_metadata_json, save_model, ModelMetadata, SerializedModel};

use crate::error::{PipelineError, Result};
use crate::training::GradientBoostingClassifier;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Fitted classifier plus the metadata needed to use it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: GradientBoostingClassifier,
}

impl ModelArtifact {
    pub fn new(model: GradientBoostingClassifier, metadata: ModelMetadata) -> Result<Self> {
        if !model.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        if model.n_features() != metadata.feature_names.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} feature names", model.n_features()),
                actual: format!("{} feature names", metadata.feature_names.len()),
            });
        }
        Ok(Self { metadata, model })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.metadata.feature_names
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        self.model.predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict_proba(x)
    }

    /// Sidecar JSON path for a model path: `model.bin` -> `model.json`
    pub fn metadata_path(path: &Path) -> PathBuf {
        path.with_extension("json")
    }

    /// Write the model and its JSON metadata next to it, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        save_model(&self.model, self.metadata.clone(), path)?;
        save_metadata_json(&self.metadata, Self::metadata_path(path))?;
        info!(path = %path.display(), features = self.metadata.feature_names.len(), "Model saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (model, metadata) = load_model::<GradientBoostingClassifier>(path)?;
        info!(path = %path.display(), trained_at = %metadata.trained_at, "Model loaded");
        Self::new(model, metadata)
    }
}
