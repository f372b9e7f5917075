//! Pipeline configuration
//!
//! Loaded once from YAML, validated, then handed by reference to every
//! stage. Only the `data_ingestion` and `data_processing` sections are
//! required; search settings and artifact paths fall back to defaults.

mod paths;

pub use paths::ArtifactPaths;

use crate::error::{PipelineError, Result};
use crate::training::BoostingType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Location used by the binaries when no override is set
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "BOOKING_PIPELINE_CONFIG";

fn default_seed() -> u64 {
    42
}

fn default_target() -> String {
    "booking_status".to_string()
}

fn default_k_neighbors() -> usize {
    5
}

fn default_n_trees() -> usize {
    100
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_ingestion: DataIngestionConfig,
    pub data_processing: DataProcessingConfig,
    #[serde(default)]
    pub model_training: ModelTrainingConfig,
    #[serde(default)]
    pub paths: ArtifactPaths,
}

/// Where the raw object lives and how to split it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub bucket_name: String,
    pub bucket_file_name: String,
    pub train_ratio: f64,
    /// Seed for the row shuffle
    #[serde(default = "default_seed")]
    pub random_state: u64,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Object storage backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Google Cloud Storage over HTTPS
    Gcs {
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// Directory tree laid out as `<root>/<bucket>/<object>`
    Local { root: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Gcs { endpoint: None }
    }
}

/// Column roles and preprocessing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProcessingConfig {
    pub categorical_columns: Vec<String>,
    pub numerical_columns: Vec<String>,
    pub skewness_threshold: f64,
    pub no_of_features: usize,
    /// Identifier columns removed before learning; every entry must exist
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default = "default_target")]
    pub target_column: String,
    /// Neighbours used when synthesizing minority rows
    #[serde(default = "default_k_neighbors")]
    pub smote_k_neighbors: usize,
    /// Trees in the forest that ranks features
    #[serde(default = "default_n_trees")]
    pub selector_n_estimators: usize,
    /// Seed shared by oversampling and the importance forest
    #[serde(default = "default_seed")]
    pub random_state: u64,
}

/// Metric maximised by the hyperparameter search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMetric {
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl Default for ScoringMetric {
    fn default() -> Self {
        ScoringMetric::Accuracy
    }
}

impl std::fmt::Display for ScoringMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScoringMetric::Accuracy => "accuracy",
            ScoringMetric::Precision => "precision",
            ScoringMetric::Recall => "recall",
            ScoringMetric::F1 => "f1",
        };
        write!(f, "{}", name)
    }
}

/// Half-open integer range `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntRange {
    pub low: i64,
    pub high: i64,
}

/// Half-open float range `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub low: f64,
    pub high: f64,
}

/// Distributions sampled by the randomized search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpaceConfig {
    pub n_estimators: IntRange,
    pub max_depth: IntRange,
    pub learning_rate: FloatRange,
    pub num_leaves: IntRange,
    pub boosting_type: Vec<BoostingType>,
}

impl Default for SearchSpaceConfig {
    fn default() -> Self {
        Self {
            n_estimators: IntRange { low: 100, high: 500 },
            max_depth: IntRange { low: 5, high: 50 },
            learning_rate: FloatRange { low: 0.01, high: 0.21 },
            num_leaves: IntRange { low: 20, high: 100 },
            boosting_type: vec![BoostingType::Gbdt, BoostingType::Goss],
        }
    }
}

/// Randomized search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTrainingConfig {
    /// Sampled configurations
    pub n_iter: usize,
    /// Cross-validation folds
    pub cv: usize,
    pub scoring: ScoringMetric,
    pub random_state: u64,
    /// Minimum rows per leaf of every boosted tree
    pub min_child_samples: usize,
    /// Histogram bins per feature; every search candidate is fitted
    /// `cv + 1` times, each round costing one pass over rows times features
    pub max_bin: usize,
    pub space: SearchSpaceConfig,
}

impl Default for ModelTrainingConfig {
    fn default() -> Self {
        Self {
            n_iter: 4,
            cv: 2,
            scoring: ScoringMetric::Accuracy,
            random_state: 42,
            min_child_samples: 20,
            max_bin: 255,
            space: SearchSpaceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::config(format!(
                "Configuration file {} does not exist",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config_with(format!("Failed to read {}", path.display()), e)
        })?;
        let config = Self::from_yaml_str(&text)?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| PipelineError::config_with("Malformed configuration", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `$BOOKING_PIPELINE_CONFIG`, falling back to `config/config.yaml`
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_yaml_file(path)
    }

    /// Replace the artifact locations
    pub fn with_paths(mut self, paths: ArtifactPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        let ingestion = &self.data_ingestion;
        if ingestion.bucket_name.trim().is_empty() {
            return Err(PipelineError::config("data_ingestion.bucket_name is empty"));
        }
        if ingestion.bucket_file_name.trim().is_empty() {
            return Err(PipelineError::config("data_ingestion.bucket_file_name is empty"));
        }
        if !(ingestion.train_ratio > 0.0 && ingestion.train_ratio < 1.0) {
            return Err(PipelineError::config(format!(
                "data_ingestion.train_ratio must be in (0, 1), got {}",
                ingestion.train_ratio
            )));
        }

        let processing = &self.data_processing;
        if processing.no_of_features == 0 {
            return Err(PipelineError::config("data_processing.no_of_features must be at least 1"));
        }
        if !processing.skewness_threshold.is_finite() || processing.skewness_threshold < 0.0 {
            return Err(PipelineError::config(format!(
                "data_processing.skewness_threshold must be a non-negative number, got {}",
                processing.skewness_threshold
            )));
        }
        if processing.smote_k_neighbors == 0 {
            return Err(PipelineError::config("data_processing.smote_k_neighbors must be at least 1"));
        }
        if processing.selector_n_estimators == 0 {
            return Err(PipelineError::config("data_processing.selector_n_estimators must be at least 1"));
        }

        let categorical: HashSet<&str> = processing.categorical_columns.iter().map(String::as_str).collect();
        if let Some(col) = processing.numerical_columns.iter().find(|c| categorical.contains(c.as_str())) {
            return Err(PipelineError::config(format!(
                "Column '{}' is listed as both categorical and numerical",
                col
            )));
        }
        if processing.numerical_columns.contains(&processing.target_column) {
            return Err(PipelineError::config(format!(
                "Target column '{}' cannot be a numerical feature",
                processing.target_column
            )));
        }
        let roles = processing.categorical_columns.iter().chain(processing.numerical_columns.iter());
        if let Some(col) = roles.clone().find(|c| processing.drop_columns.contains(c)) {
            return Err(PipelineError::config(format!(
                "Column '{}' is both dropped and used as a feature",
                col
            )));
        }
        if processing.drop_columns.contains(&processing.target_column) {
            return Err(PipelineError::config(format!(
                "Target column '{}' is listed in drop_columns",
                processing.target_column
            )));
        }

        let training = &self.model_training;
        if training.n_iter == 0 {
            return Err(PipelineError::config("model_training.n_iter must be at least 1"));
        }
        if training.cv < 2 {
            return Err(PipelineError::config("model_training.cv must be at least 2"));
        }
        if training.min_child_samples == 0 {
            return Err(PipelineError::config("model_training.min_child_samples must be at least 1"));
        }
        if !(2..=256).contains(&training.max_bin) {
            return Err(PipelineError::config(format!(
                "model_training.max_bin must be between 2 and 256, got {}",
                training.max_bin
            )));
        }

        let space = &training.space;
        for (name, range) in [
            ("n_estimators", space.n_estimators),
            ("max_depth", space.max_depth),
            ("num_leaves", space.num_leaves),
        ] {
            if range.low < 1 || range.low >= range.high {
                return Err(PipelineError::config(format!(
                    "model_training.space.{} must satisfy 1 <= low < high, got [{}, {})",
                    name, range.low, range.high
                )));
            }
        }
        if space.num_leaves.low < 2 {
            return Err(PipelineError::config("model_training.space.num_leaves must start at 2 or more"));
        }
        let lr = space.learning_rate;
        if !(lr.low > 0.0 && lr.low < lr.high) {
            return Err(PipelineError::config(format!(
                "model_training.space.learning_rate must satisfy 0 < low < high, got [{}, {})",
                lr.low, lr.high
            )));
        }
        if space.boosting_type.is_empty() {
            return Err(PipelineError::config("model_training.space.boosting_type is empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
data_ingestion:
  bucket_name: my-bucket
  bucket_file_name: Hotel_Reservations.csv
  train_ratio: 0.8
data_processing:
  categorical_columns: [type_of_meal_plan, booking_status]
  numerical_columns: [lead_time, avg_price_per_room]
  skewness_threshold: 5
  no_of_features: 10
"#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = PipelineConfig::from_yaml_str(MINIMAL).unwrap();

        assert_eq!(config.data_ingestion.random_state, 42);
        assert_eq!(config.data_ingestion.storage, StorageConfig::Gcs { endpoint: None });
        assert_eq!(config.data_processing.target_column, "booking_status");
        assert!(config.data_processing.drop_columns.is_empty());
        assert_eq!(config.model_training, ModelTrainingConfig::default());
        assert_eq!(config.paths, ArtifactPaths::default());
    }

    #[test]
    fn test_local_storage_backend() {
        let yaml = MINIMAL.replace(
            "  train_ratio: 0.8\n",
            "  train_ratio: 0.8\n  storage:\n    backend: local\n    root: /data/buckets\n",
        );
        let config = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(
            config.data_ingestion.storage,
            StorageConfig::Local { root: PathBuf::from("/data/buckets") }
        );
    }

    #[test]
    fn test_missing_required_key_is_config_error() {
        let yaml = MINIMAL.replace("  no_of_features: 10\n", "");
        let err = PipelineConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let yaml = MINIMAL.replace("train_ratio: 0.8", "train_ratio: 1.5");
        let err = PipelineConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("train_ratio"));
    }

    #[test]
    fn test_overlapping_roles_rejected() {
        let yaml = MINIMAL.replace(
            "numerical_columns: [lead_time, avg_price_per_room]",
            "numerical_columns: [lead_time, type_of_meal_plan]",
        );
        assert!(PipelineConfig::from_yaml_str(&yaml).unwrap_err().is_config());
    }

    #[test]
    fn test_empty_categorical_list_is_valid() {
        let yaml = MINIMAL.replace("[type_of_meal_plan, booking_status]", "[]");
        let config = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert!(config.data_processing.categorical_columns.is_empty());
    }

    #[test]
    fn test_max_bin_out_of_range_rejected() {
        let yaml = format!("{}model_training:\n  max_bin: 1000\n", MINIMAL);
        let err = PipelineConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("max_bin"));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = PipelineConfig::from_yaml_str(include_str!("../../config/config.yaml")).unwrap();
        assert_eq!(config.data_processing.drop_columns, vec!["Booking_ID".to_string()]);
        assert!(config.data_processing.categorical_columns.contains(&"booking_status".to_string()));
        assert_eq!(config.model_training, ModelTrainingConfig::default());
        assert_eq!(config.paths, ArtifactPaths::default());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PipelineConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_file_with_search_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "{}model_training:\n  n_iter: 2\n  scoring: f1\n  space:\n    boosting_type: [gbdt]\n",
            MINIMAL
        )
        .unwrap();

        let config = PipelineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.model_training.n_iter, 2);
        assert_eq!(config.model_training.cv, 2);
        assert_eq!(config.model_training.scoring, ScoringMetric::F1);
        assert_eq!(config.model_training.space.boosting_type, vec![BoostingType::Gbdt]);
        assert_eq!(config.model_training.space.n_estimators, IntRange { low: 100, high: 500 });
    }
}
