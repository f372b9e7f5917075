//! Label encoding for categorical columns
//!
//! Codes follow the sorted order of the labels seen at fit time:
//! lexicographic for text columns, numeric for numeric ones.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What to do with a label that was not seen at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnseenCategory {
    /// Map to the reserved code `n_labels`
    Reserved,
    /// Fail the transform
    Error,
}

/// Sorted labels of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelSet {
    Text(Vec<String>),
    Numeric(Vec<f64>),
}

impl LabelSet {
    pub fn len(&self) -> usize {
        match self {
            LabelSet::Text(v) => v.len(),
            LabelSet::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnMapping {
    labels: LabelSet,
    unseen: UnseenCategory,
}

/// Label encoder fitted on one frame and reused on others
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    mappings: BTreeMap<String, ColumnMapping>,
    strict_columns: Vec<String>,
    is_fitted: bool,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unseen or missing labels in `column` fail the transform instead of
    /// taking the reserved code
    pub fn with_strict_column(mut self, column: impl Into<String>) -> Self {
        self.strict_columns.push(column.into());
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted labels of a column, in code order
    pub fn labels(&self, column: &str) -> Option<&LabelSet> {
        self.mappings.get(column).map(|m| &m.labels)
    }

    /// Fitting on no columns is allowed; transform then passes frames through.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.mappings.clear();
        self.is_fitted = false;
        for name in columns {
            let series = df
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?
                .as_materialized_series();

            let labels = build_labels(series)?;
            if labels.is_empty() {
                return Err(PipelineError::DataError(format!(
                    "Categorical column '{}' has no non-null values",
                    name
                )));
            }

            let unseen = if self.strict_columns.contains(name) {
                UnseenCategory::Error
            } else {
                UnseenCategory::Reserved
            };
            debug!(column = %name, n_labels = labels.len(), "Fitted label mapping");
            self.mappings.insert(name.clone(), ColumnMapping { labels, unseen });
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its Int64 codes
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (name, mapping) in &self.mappings {
            let series = df
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.clone()))?
                .as_materialized_series();

            let (codes, n_unseen) = encode_series(series, &mapping.labels)?;
            if n_unseen > 0 {
                match mapping.unseen {
                    UnseenCategory::Error => {
                        return Err(PipelineError::ValidationError(format!(
                            "Column '{}' has {} value(s) not seen when fitting",
                            name, n_unseen
                        )));
                    }
                    UnseenCategory::Reserved => {
                        warn!(column = %name, count = n_unseen, code = mapping.labels.len(), "Unseen labels mapped to reserved code");
                    }
                }
            }

            let reserved = mapping.labels.len() as i64;
            let values: Vec<i64> = codes.into_iter().map(|c| c.unwrap_or(reserved)).collect();
            result.with_column(Series::new(name.as_str().into(), values))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

fn build_labels(series: &Series) -> Result<LabelSet> {
    if series.dtype() == &DataType::String {
        let mut labels: Vec<String> = series.str()?.into_iter().flatten().map(str::to_string).collect();
        labels.sort();
        labels.dedup();
        Ok(LabelSet::Text(labels))
    } else {
        let as_f64 = series.cast(&DataType::Float64)?;
        let mut labels: Vec<f64> = as_f64.f64()?.into_iter().flatten().filter(|v| !v.is_nan()).collect();
        labels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        labels.dedup();
        Ok(LabelSet::Numeric(labels))
    }
}

/// Codes per row (`None` for unseen or null) and the unseen count
fn encode_series(series: &Series, labels: &LabelSet) -> Result<(Vec<Option<i64>>, usize)> {
    let codes: Vec<Option<i64>> = match labels {
        LabelSet::Text(sorted) => {
            let as_text = series.cast(&DataType::String)?;
            as_text
                .str()?
                .into_iter()
                .map(|v| v.and_then(|s| sorted.binary_search_by(|l| l.as_str().cmp(s)).ok()).map(|i| i as i64))
                .collect()
        }
        LabelSet::Numeric(sorted) => {
            let as_f64 = series.cast(&DataType::Float64)?;
            as_f64
                .f64()?
                .into_iter()
                .map(|v| {
                    v.and_then(|x| {
                        sorted
                            .binary_search_by(|l| l.partial_cmp(&x).unwrap_or(Ordering::Less))
                            .ok()
                    })
                    .map(|i| i as i64)
                })
                .collect()
        }
    };
    let n_unseen = codes.iter().filter(|c| c.is_none()).count();
    Ok((codes, n_unseen))
}
