//! CSV loading and atomic saving

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Rows scanned when inferring column types
const INFER_SCHEMA_ROWS: usize = 1000;

/// Reads headered CSV files into DataFrames
#[derive(Debug, Clone)]
pub struct DataLoader {
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(INFER_SCHEMA_ROWS),
        }
    }

    /// Rows used for type inference; `None` scans the whole file
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }
}

/// Writes DataFrames without an index column
pub struct DataSaver;

impl DataSaver {
    /// Write `df` as CSV to a temp file beside `path`, then rename it into place
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_atomic(path, |file| {
            CsvWriter::new(file)
                .include_header(true)
                .finish(df)
                .map_err(PipelineError::from)
        })?;
        debug!(path = %path.display(), rows = df.height(), "Saved CSV");
        Ok(())
    }
}

/// Run `write` against a temp file in the destination directory and persist it on success.
///
/// A failed write leaves any existing file at `path` untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PipelineError::IoError(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data.csv");

        let mut df = df! {
            "a" => &[1i64, 2, 3],
            "b" => &["x", "y", "z"],
        }
        .unwrap();

        DataSaver::save_csv(&mut df, &path).unwrap();
        let loaded = DataLoader::new().load_csv(&path).unwrap();

        assert_eq!(loaded.height(), 3);
        let names: Vec<String> = loaded.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = DataLoader::new().load_csv("/no/such/file.csv");
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "old").unwrap();

        let result = write_atomic(&path, |_| Err(PipelineError::DataError("boom".to_string())));

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
    }
}
