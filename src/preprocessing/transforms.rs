//! Skewness correction
//!
//! Columns whose sample skewness exceeds a threshold on the fitting frame
//! are replaced by `log1p(x)`. The decision is made once and replayed on
//! every later frame.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Adjusted Fisher-Pearson sample skewness (`G1`) over the finite values.
///
/// Returns 0 for fewer than three values or a constant column.
pub fn sample_skewness(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n < 3 {
        return 0.0;
    }

    let nf = n as f64;
    let mean = finite.iter().sum::<f64>() / nf;
    let (m2, m3) = finite.iter().fold((0.0, 0.0), |(m2, m3), &v| {
        let d = v - mean;
        (m2 + d * d, m3 + d * d * d)
    });
    let m2 = m2 / nf;
    let m3 = m3 / nf;

    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }

    let g1 = m3 / m2.powf(1.5);
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// Per-column outcome of fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewDecision {
    pub column: String,
    pub skew_before: f64,
    pub skew_after: Option<f64>,
    pub transformed: bool,
}

/// Applies `log1p` to the numerical columns that were too skewed at fit time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkewCorrector {
    threshold: f64,
    decisions: Vec<SkewDecision>,
    is_fitted: bool,
}

impl SkewCorrector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            decisions: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn decisions(&self) -> &[SkewDecision] {
        &self.decisions
    }

    /// Columns that will be transformed
    pub fn transformed_columns(&self) -> Vec<&str> {
        self.decisions
            .iter()
            .filter(|d| d.transformed)
            .map(|d| d.column.as_str())
            .collect()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.decisions.clear();

        for name in columns {
            let values = numeric_values(df, name)?;
            let skew_before = sample_skewness(&values);

            let mut decision = SkewDecision {
                column: name.clone(),
                skew_before,
                skew_after: None,
                transformed: false,
            };

            if skew_before.abs() > self.threshold {
                let logged = log1p_values(name, &values)?;
                let skew_after = sample_skewness(&logged);
                decision.skew_after = Some(skew_after);

                if skew_after.abs() < skew_before.abs() {
                    decision.transformed = true;
                    debug!(column = %name, skew_before, skew_after, "Column selected for log1p");
                } else {
                    warn!(
                        column = %name,
                        skew_before,
                        skew_after,
                        "log1p does not reduce skewness, column left unchanged"
                    );
                }
            }

            self.decisions.push(decision);
        }

        self.is_fitted = true;
        info!(
            checked = self.decisions.len(),
            transformed = self.transformed_columns().len(),
            threshold = self.threshold,
            "Skewness correction fitted"
        );
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for name in self.transformed_columns() {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
            let as_f64 = column.as_materialized_series().cast(&DataType::Float64)?;

            let mut out: Vec<Option<f64>> = Vec::with_capacity(as_f64.len());
            for (row, v) in as_f64.f64()?.into_iter().enumerate() {
                out.push(match v {
                    Some(x) if x <= -1.0 => {
                        return Err(PipelineError::DataError(format!(
                            "log1p is undefined for value {} in column '{}' at row {}",
                            x, name, row
                        )));
                    }
                    Some(x) => Some(x.ln_1p()),
                    None => None,
                });
            }
            result.with_column(Series::new(name.into(), out))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
    let as_f64 = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(as_f64.f64()?.into_iter().flatten().collect())
}

fn log1p_values(name: &str, values: &[f64]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|&v| {
            if v <= -1.0 {
                Err(PipelineError::DataError(format!(
                    "log1p is undefined for value {} in column '{}'",
                    v, name
                )))
            } else {
                Ok(v.ln_1p())
            }
        })
        .collect()
}
