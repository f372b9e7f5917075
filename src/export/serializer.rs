//! Binary model envelope
//!
//! Layout: magic bytes, format version, metadata, bincode model payload and an
//! FNV-1a checksum over the payload. Written atomically and verified on load.

use crate::error::{PipelineError, Result};
use crate::optimizer::TrialParams;
use crate::utils::write_atomic;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Descriptive fields stored next to the fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub model_type: String,
    /// Crate version that produced the file
    pub version: String,
    pub trained_at: DateTime<Utc>,
    /// Feature columns in the order the model expects them
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub hyperparameters: TrialParams,
    /// Mean cross-validation score of the chosen hyperparameters
    pub cv_score: Option<f64>,
    pub metrics: BTreeMap<String, f64>,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_type: "unknown".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            feature_names: Vec::new(),
            target_name: String::new(),
            hyperparameters: TrialParams::new(),
            cv_score: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = target.into();
        self
    }

    pub fn with_hyperparameters(mut self, params: TrialParams) -> Self {
        self.hyperparameters = params;
        self
    }

    pub fn with_cv_score(mut self, score: f64) -> Self {
        self.cv_score = Some(score);
        self
    }

    pub fn add_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// On-disk wrapper around a bincode payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedModel {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub model_data: Vec<u8>,
    pub checksum: u64,
}

impl SerializedModel {
    pub const MAGIC: [u8; 4] = *b"BKGM";
    pub const VERSION: u32 = 1;

    pub fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    /// FNV-1a hash of the payload
    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(&self.model_data) == self.checksum
    }

    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(PipelineError::SerializationError(
                "Not a model file: bad magic bytes".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(PipelineError::SerializationError(format!(
                "Unsupported model format version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(PipelineError::SerializationError(
                "Checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize `model` with `metadata` and write it to `path` atomically
pub fn save_model<M: Serialize>(model: &M, metadata: ModelMetadata, path: impl AsRef<Path>) -> Result<()> {
    let model_data = bincode::serialize(model)?;
    let serialized = SerializedModel::new(metadata, model_data);

    write_atomic(path.as_ref(), |file| {
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &serialized)?;
        writer.flush()?;
        Ok(())
    })
}

/// Read a model written by [`save_model`], verifying magic, version and checksum
pub fn load_model<M: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(M, ModelMetadata)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let serialized: SerializedModel = bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| PipelineError::SerializationError(format!("{}: {}", path.display(), e)))?;

    serialized.verify()?;

    let model: M = bincode::deserialize(&serialized.model_data)?;
    Ok((model, serialized.metadata))
}

/// Write `metadata` as pretty JSON, atomically
pub fn save_metadata_json(metadata: &ModelMetadata, path: impl AsRef<Path>) -> Result<()> {
    write_atomic(path.as_ref(), |file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, metadata)?;
        writer.flush()?;
        Ok(())
    })
}
