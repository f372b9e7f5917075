//! Ingestion stage
//!
//! Fetches the raw dataset from object storage and writes a seeded
//! train/test split next to it.

mod store;

pub use store::{from_config, GcsObjectStore, LocalObjectStore, ObjectStore, GCS_ENDPOINT, GCS_TOKEN_ENV};

use crate::config::{ArtifactPaths, DataIngestionConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::utils::{DataLoader, DataSaver, StageGuard};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing::{error, info};

/// Split `df` into train and test by shuffling row positions with `seed`.
///
/// Train takes the first `floor(ratio * n)` positions of the permutation.
/// Both sides must end up non-empty.
pub fn split_frame(df: &DataFrame, ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(PipelineError::ValidationError(format!(
            "Train ratio must be in (0, 1), got {}",
            ratio
        )));
    }

    let n = df.height();
    let n_train = (ratio * n as f64).floor() as usize;
    if n_train == 0 || n_train == n {
        return Err(PipelineError::ValidationError(format!(
            "Splitting {} rows with ratio {} leaves one side empty",
            n, ratio
        )));
    }

    let mut order: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let (train_idx, test_idx) = order.split_at(n_train);
    let train = df.take(&IdxCa::from_vec("idx".into(), train_idx.to_vec()))?;
    let test = df.take(&IdxCa::from_vec("idx".into(), test_idx.to_vec()))?;
    Ok((train, test))
}

/// Downloads the raw file and writes the train/test split
pub struct DataIngestion {
    config: DataIngestionConfig,
    paths: ArtifactPaths,
    store: Box<dyn ObjectStore>,
}

impl DataIngestion {
    /// Build the stage with the configured storage backend.
    ///
    /// Creates the artifact directory tree.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let store = from_config(&config.data_ingestion.storage)?;
        Self::with_store(config, store)
    }

    /// Build the stage around an explicit store
    pub fn with_store(config: &PipelineConfig, store: Box<dyn ObjectStore>) -> Result<Self> {
        config
            .paths
            .ensure_dirs()
            .map_err(|e| PipelineError::ingestion("Failed to create artifact directories", e))?;

        info!(
            bucket = %config.data_ingestion.bucket_name,
            file = %config.data_ingestion.bucket_file_name,
            "Data ingestion configured"
        );
        Ok(Self {
            config: config.data_ingestion.clone(),
            paths: config.paths.clone(),
            store,
        })
    }

    /// Download the configured object to the raw file path
    pub fn fetch(&self) -> Result<PathBuf> {
        let bucket = &self.config.bucket_name;
        let key = &self.config.bucket_file_name;
        let dest = &self.paths.raw_file;

        self.store.download(bucket, key, dest).map_err(|e| {
            error!(object = %self.store.describe(bucket, key), error = %e, "Download failed");
            match e {
                PipelineError::IngestionError { .. } => e,
                other => PipelineError::ingestion(
                    format!("Failed to download {}", self.store.describe(bucket, key)),
                    other,
                ),
            }
        })?;

        info!(
            object = %self.store.describe(bucket, key),
            dest = %dest.display(),
            "Raw file downloaded"
        );
        Ok(dest.clone())
    }

    /// Split the raw file and write both sides. Returns `(train_rows, test_rows)`.
    pub fn split(&self, ratio: f64) -> Result<(usize, usize)> {
        let raw = &self.paths.raw_file;
        let df = DataLoader::new()
            .load_csv(raw)
            .map_err(|e| PipelineError::ingestion(format!("Cannot read raw file {}", raw.display()), e))?;
        if df.height() == 0 {
            return Err(PipelineError::IngestionError {
                message: format!("Raw file {} has no rows", raw.display()),
                source: None,
            });
        }

        let (mut train, mut test) = split_frame(&df, ratio, self.config.random_state)
            .map_err(|e| PipelineError::ingestion("Failed to split the raw data", e))?;

        DataSaver::save_csv(&mut train, &self.paths.train_file)
            .map_err(|e| PipelineError::ingestion("Failed to write the train split", e))?;
        DataSaver::save_csv(&mut test, &self.paths.test_file)
            .map_err(|e| PipelineError::ingestion("Failed to write the test split", e))?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            train_path = %self.paths.train_file.display(),
            test_path = %self.paths.test_file.display(),
            "Train and test data saved"
        );
        Ok((train.height(), test.height()))
    }

    /// Fetch then split with the configured ratio
    pub fn run(&self) -> Result<(usize, usize)> {
        let mut guard = StageGuard::new("ingestion");

        self.fetch()?;
        guard.step("fetch");
        let counts = self.split(self.config.train_ratio)?;
        guard.step("split");

        guard.succeed();
        Ok(counts)
    }
}
