//! On-disk artifact locations shared by the stages

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fixed locations of every file handed from one stage to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    /// Directory holding the downloaded file and the train/test split
    pub raw_dir: PathBuf,
    /// Downloaded dataset
    pub raw_file: PathBuf,
    /// Train split written by ingestion
    pub train_file: PathBuf,
    /// Test split written by ingestion
    pub test_file: PathBuf,
    /// Directory holding the model-ready files
    pub processed_dir: PathBuf,
    /// Model-ready train set
    pub processed_train_file: PathBuf,
    /// Model-ready test set
    pub processed_test_file: PathBuf,
    /// Serialized model artifact
    pub model_output_path: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::under("artifacts")
    }
}

impl ArtifactPaths {
    /// Lay out the standard tree below `root`
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let raw_dir = root.join("raw");
        let processed_dir = root.join("processed");

        Self {
            raw_file: raw_dir.join("raw.csv"),
            train_file: raw_dir.join("train.csv"),
            test_file: raw_dir.join("test.csv"),
            raw_dir,
            processed_train_file: processed_dir.join("processed_train.csv"),
            processed_test_file: processed_dir.join("processed_test.csv"),
            processed_dir,
            model_output_path: root.join("models").join("lgbm_model.bin"),
        }
    }

    /// Create the raw, processed and model directories if they are missing
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.raw_dir)?;
        std::fs::create_dir_all(&self.processed_dir)?;
        if let Some(parent) = self.model_output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_under_root() {
        let paths = ArtifactPaths::under("/tmp/run");
        assert_eq!(paths.raw_file, PathBuf::from("/tmp/run/raw/raw.csv"));
        assert_eq!(paths.processed_test_file, PathBuf::from("/tmp/run/processed/processed_test.csv"));
        assert_eq!(paths.model_output_path, PathBuf::from("/tmp/run/models/lgbm_model.bin"));
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::under(dir.path().join("artifacts"));

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(paths.raw_dir.is_dir());
        assert!(paths.processed_dir.is_dir());
        assert!(paths.model_output_path.parent().unwrap().is_dir());
    }
}
