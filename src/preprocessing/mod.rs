//! Preprocessing stage
//!
//! Turns the raw train/test split into model-ready files:
//! clean, encode categoricals, correct skew, balance the train set,
//! select the top features, save. Every step is a frame-in frame-out
//! function that can be used on its own; [`DataProcessor`] wires them
//! together with the configured columns and artifact paths.

pub mod cleaning;
pub mod encoder;
pub mod feature_selection;
pub mod transforms;

pub use cleaning::{drop_duplicates, Cleaner};
pub use encoder::{LabelEncoder, LabelSet, UnseenCategory};
pub use feature_selection::FeatureSelector;
pub use transforms::{sample_skewness, SkewCorrector, SkewDecision};

use crate::config::{ArtifactPaths, DataProcessingConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::synthetic::{class_counts, Sampler, SMOTE};
use crate::utils::frame::{array2_to_frame, column_labels, columns_to_array2, feature_columns};
use crate::utils::{DataLoader, DataSaver, StageGuard};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{error, info};

/// Shapes and selected columns of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSummary {
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
    pub selected_features: Vec<String>,
}

/// Fail with `ConfigError` naming every configured column absent from `df`
pub fn require_columns(df: &DataFrame, columns: &[&str], frame: &str) -> Result<()> {
    let present: HashSet<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
    let missing: Vec<&str> = columns.iter().copied().filter(|c| !present.contains(c)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::config(format!(
            "Configured columns missing from {} data: {}",
            frame,
            missing.join(", ")
        )))
    }
}

/// Oversample every minority class of `df` up to the majority count with SMOTE.
///
/// All non-target columns must be numeric; they come back as `Float64`
/// and the target as `Int64`. Original rows keep their order and the
/// synthetic rows follow them.
pub fn balance(df: &DataFrame, target: &str, k_neighbors: usize, seed: u64) -> Result<DataFrame> {
    let features = feature_columns(df, target);
    let x = columns_to_array2(df, &features)?;
    let y = column_labels(df, target)?;

    let mut smote = SMOTE::new().with_k_neighbors(k_neighbors).with_seed(seed);
    let resampled = smote.fit_resample(&x, &y)?;

    info!(
        before = ?class_counts(&y),
        after = ?class_counts(&resampled.y),
        synthetic = resampled.total_synthetic(),
        "Balanced classes"
    );
    array2_to_frame(&resampled.x, &features, &resampled.y, target)
}

fn wrap<T>(step: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!(step, error = %e, "Preprocessing step failed");
        PipelineError::preprocessing(format!("{} failed", step), e)
    })
}

/// Runs every preprocessing step over the split files
#[derive(Debug, Clone)]
pub struct DataProcessor {
    config: DataProcessingConfig,
    paths: ArtifactPaths,
}

impl DataProcessor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.data_processing.clone(),
            paths: config.paths.clone(),
        }
    }

    fn configured_columns(&self) -> Vec<&str> {
        let cfg = &self.config;
        cfg.drop_columns
            .iter()
            .chain(cfg.categorical_columns.iter())
            .chain(cfg.numerical_columns.iter())
            .chain(std::iter::once(&cfg.target_column))
            .map(String::as_str)
            .collect()
    }

    /// Process already-loaded train and test frames in memory
    pub fn process_frames(&self, train: &DataFrame, test: &DataFrame) -> Result<(DataFrame, DataFrame, Vec<String>)> {
        let cfg = &self.config;
        let required = self.configured_columns();

        wrap("Schema check", require_columns(train, &required, "train"))?;
        wrap("Schema check", require_columns(test, &required, "test"))?;

        let cleaner = Cleaner::new(&cfg.drop_columns);
        let train = wrap("Cleaning", cleaner.clean(train))?;
        let test = wrap("Cleaning", cleaner.clean(test))?;

        let mut encoder = LabelEncoder::new().with_strict_column(cfg.target_column.clone());
        wrap("Label encoding", encoder.fit(&train, &cfg.categorical_columns).map(|_| ()))?;
        let train = wrap("Label encoding", encoder.transform(&train))?;
        let test = wrap("Label encoding", encoder.transform(&test))?;

        let mut skew = SkewCorrector::new(cfg.skewness_threshold);
        wrap("Skewness correction", skew.fit(&train, &cfg.numerical_columns).map(|_| ()))?;
        let train = wrap("Skewness correction", skew.transform(&train))?;
        let test = wrap("Skewness correction", skew.transform(&test))?;

        let train = wrap(
            "Class balancing",
            balance(&train, &cfg.target_column, cfg.smote_k_neighbors, cfg.random_state),
        )?;

        let mut selector = FeatureSelector::new(cfg.no_of_features)
            .with_n_estimators(cfg.selector_n_estimators)
            .with_random_state(cfg.random_state);
        let train = wrap("Feature selection", selector.fit_transform(&train, &cfg.target_column))?;
        let test = wrap("Feature selection", selector.transform(&test))?;
        let selected = selector.selected_features().unwrap_or_default();

        Ok((train, test, selected))
    }

    /// Load the split files, process them and write the processed files
    pub fn process(&self) -> Result<ProcessingSummary> {
        let mut guard = StageGuard::new("preprocessing");

        wrap("Preparing directories", self.paths.ensure_dirs())?;
        let loader = DataLoader::new();
        let train = wrap("Loading train data", loader.load_csv(&self.paths.train_file))?;
        let test = wrap("Loading test data", loader.load_csv(&self.paths.test_file))?;
        guard.step("load");

        let (mut train, mut test, selected_features) = self.process_frames(&train, &test)?;
        guard.step("transform");

        wrap("Saving train data", DataSaver::save_csv(&mut train, &self.paths.processed_train_file))?;
        wrap("Saving test data", DataSaver::save_csv(&mut test, &self.paths.processed_test_file))?;
        guard.step("save");

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            columns = train.width(),
            train_path = %self.paths.processed_train_file.display(),
            test_path = %self.paths.processed_test_file.display(),
            "Processed data saved"
        );
        guard.succeed();

        Ok(ProcessingSummary {
            train_shape: train.shape(),
            test_shape: test.shape(),
            selected_features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_equalizes_classes() {
        let df = df! {
            "x1" => &[0.0f64, 0.1, 0.2, 0.3, 0.4, 0.5, 5.0, 5.1, 5.2],
            "x2" => &[1.0f64, 1.1, 1.2, 1.3, 1.4, 1.5, 9.0, 9.1, 9.2],
            "booking_status" => &[0i64, 0, 0, 0, 0, 0, 1, 1, 1],
        }
        .unwrap();

        let out = balance(&df, "booking_status", 2, 42).unwrap();

        assert_eq!(out.height(), 12);
        let labels = column_labels(&out, "booking_status").unwrap();
        let counts = class_counts(&labels);
        assert_eq!(counts.get(&0), Some(&6));
        assert_eq!(counts.get(&1), Some(&6));
        // originals stay as a prefix
        let x1 = crate::utils::frame::column_f64(&out, "x1").unwrap();
        assert_eq!(x1[..9], crate::utils::frame::column_f64(&df, "x1").unwrap()[..]);
    }

    #[test]
    fn test_balance_single_class_fails() {
        let df = df! {
            "x" => &[1.0f64, 2.0, 3.0],
            "booking_status" => &[1i64, 1, 1],
        }
        .unwrap();
        assert!(balance(&df, "booking_status", 5, 42).is_err());
    }

    #[test]
    fn test_balance_rejects_text_features() {
        let df = df! {
            "room" => &["a", "b", "c", "d"],
            "booking_status" => &[0i64, 0, 0, 1],
        }
        .unwrap();
        assert!(balance(&df, "booking_status", 1, 42).is_err());
    }

    #[test]
    fn test_require_columns_lists_missing() {
        let df = df! { "a" => &[1i64] }.unwrap();
        let err = require_columns(&df, &["a", "b", "c"], "train").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("b, c"));
    }
}
