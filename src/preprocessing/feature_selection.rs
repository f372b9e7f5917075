//! Importance-based feature selection
//!
//! A random forest is fitted on the (balanced) training frame and features
//! are ranked by their impurity importance. The top `k` are kept together
//! with the target, and every later frame is cut down to that exact column
//! list.

use crate::error::{PipelineError, Result};
use crate::training::{MaxFeatures, RandomForest};
use crate::utils::frame::{column_labels, columns_to_array2, feature_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Top-k selector driven by random forest importances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    k: usize,
    n_estimators: usize,
    random_state: u64,
    ranking: Option<Vec<(String, f64)>>,
    target: Option<String>,
}

impl FeatureSelector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_estimators: 100,
            random_state: 42,
            ranking: None,
            target: None,
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Features ordered by importance, highest first
    pub fn ranking(&self) -> Option<&[(String, f64)]> {
        self.ranking.as_deref()
    }

    /// Kept features in ranking order, without the target
    pub fn selected_features(&self) -> Option<Vec<String>> {
        self.ranking
            .as_ref()
            .map(|r| r.iter().take(self.k).map(|(name, _)| name.clone()).collect())
    }

    /// Kept features followed by the target
    pub fn selected_columns(&self) -> Option<Vec<String>> {
        let mut columns = self.selected_features()?;
        columns.push(self.target.clone()?);
        Some(columns)
    }

    /// Rank every non-target column of `df`
    pub fn fit(&mut self, df: &DataFrame, target: &str) -> Result<&mut Self> {
        let features = feature_columns(df, target);
        if features.is_empty() {
            return Err(PipelineError::ValidationError(
                "No feature columns left to select from".to_string(),
            ));
        }
        if self.k > features.len() {
            return Err(PipelineError::ValidationError(format!(
                "Requested {} features but only {} are available",
                self.k,
                features.len()
            )));
        }

        let x = columns_to_array2(df, &features)?;
        let y = column_labels(df, target)?;

        let mut forest = RandomForest::new(self.n_estimators)
            .with_max_features(MaxFeatures::Sqrt)
            .with_random_state(self.random_state);
        forest.fit(&x, &y)?;
        let importances = forest.feature_importances().ok_or(PipelineError::ModelNotFitted)?;

        let mut ranking: Vec<(String, f64)> = features
            .into_iter()
            .zip(importances.iter().copied())
            .collect();
        // stable: equal importances keep column order
        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for (rank, (name, score)) in ranking.iter().enumerate() {
            debug!(rank = rank + 1, feature = %name, importance = score, "Feature importance");
        }

        self.ranking = Some(ranking);
        self.target = Some(target.to_string());

        if let Some(selected) = self.selected_features() {
            info!(k = self.k, selected = ?selected, "Selected top features");
        }
        Ok(self)
    }

    /// Restrict `df` to the selected columns, in selection order
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let columns = self.selected_columns().ok_or(PipelineError::ModelNotFitted)?;
        if let Some(missing) = columns.iter().find(|c| df.get_column_index(c).is_none()) {
            return Err(PipelineError::FeatureNotFound(missing.clone()));
        }
        Ok(df.select(columns)?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, target: &str) -> Result<DataFrame> {
        self.fit(df, target)?;
        self.transform(df)
    }
}
