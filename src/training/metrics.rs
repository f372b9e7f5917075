//! Classification metrics

use crate::config::ScoringMetric;
use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Binary confusion matrix counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    /// Tally predictions against truth, treating `positive` as the positive class
    pub fn compute(y_true: &Array1<i64>, y_pred: &Array1<i64>, positive: i64) -> Self {
        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == positive, p == positive) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Test-set scores of a fitted classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl EvaluationMetrics {
    /// Label treated as the positive class
    pub const POSITIVE_LABEL: i64 = 1;

    /// Score predictions; a ratio with a zero denominator is reported as 0
    pub fn compute(y_true: &Array1<i64>, y_pred: &Array1<i64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PipelineError::ValidationError("Cannot score an empty set".to_string()));
        }

        let c = ConfusionCounts::compute(y_true, y_pred, Self::POSITIVE_LABEL);
        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

        let accuracy = ratio(c.tp + c.tn, c.total());
        let precision = ratio(c.tp, c.tp + c.fp);
        let recall = ratio(c.tp, c.tp + c.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self { accuracy, precision, recall, f1 })
    }

    pub fn get(&self, metric: ScoringMetric) -> f64 {
        match metric {
            ScoringMetric::Accuracy => self.accuracy,
            ScoringMetric::Precision => self.precision,
            ScoringMetric::Recall => self.recall,
            ScoringMetric::F1 => self.f1,
        }
    }

    /// Metric name to value
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1", self.f1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }
}
