//! Identifier and duplicate removal

use crate::error::Result;
use polars::prelude::*;
use tracing::debug;

/// Drops configured identifier columns and exact-duplicate rows.
///
/// Only columns that are present are dropped, so cleaning an already
/// cleaned frame is a no-op. Callers check the schema beforehand with
/// [`super::require_columns`].
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    drop_columns: Vec<String>,
}

impl Cleaner {
    pub fn new(drop_columns: &[String]) -> Self {
        Self {
            drop_columns: drop_columns.to_vec(),
        }
    }

    pub fn drop_columns(&self) -> &[String] {
        &self.drop_columns
    }

    /// Remove listed columns that are present, then duplicate rows
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for name in &self.drop_columns {
            if result.get_column_index(name).is_some() {
                result = result.drop(name)?;
            }
        }
        let deduped = drop_duplicates(&result)?;
        debug!(
            rows_in = df.height(),
            rows_out = deduped.height(),
            cols_out = deduped.width(),
            "Cleaned frame"
        );
        Ok(deduped)
    }
}

/// Remove exact-duplicate rows, keeping the first occurrence in order.
/// Nulls compare equal to each other.
pub fn drop_duplicates(df: &DataFrame) -> Result<DataFrame> {
    if df.height() == 0 || df.width() == 0 {
        return Ok(df.clone());
    }
    Ok(df.unique_stable(None, UniqueKeepStrategy::First, None)?)
}
