//! Training stage: search, refit, evaluate, persist

use super::cross_validation::{CVSplit, StratifiedKFold};
use super::gradient_boosting::{BoostingType, GradientBoostingClassifier, GradientBoostingConfig};
use super::metrics::EvaluationMetrics;
use crate::config::{ArtifactPaths, ModelTrainingConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::export::{ModelArtifact, ModelMetadata};
use crate::optimizer::{format_params, OptimizeDirection, ParameterValue, RandomSearch, SearchSpace, TrialParams};
use crate::utils::frame::{column_labels, columns_to_array2, feature_columns};
use crate::utils::{DataLoader, StageGuard};
use ndarray::{Array1, Array2, Axis};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info};

/// Model name recorded in the artifact metadata
pub const MODEL_NAME: &str = "booking_cancellation";

/// Feature matrices and labels read from the processed files
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub feature_names: Vec<String>,
    pub x_train: Array2<f64>,
    pub y_train: Array1<i64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<i64>,
}

/// Refitted best model and how it was chosen
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: GradientBoostingClassifier,
    pub best_params: TrialParams,
    pub cv_score: f64,
}

/// Searchable hyperparameters of the boosted classifier
pub fn build_search_space(config: &ModelTrainingConfig) -> SearchSpace {
    let space = &config.space;
    // config ranges are half-open, integer parameters are sampled inclusively
    SearchSpace::new()
        .int("n_estimators", space.n_estimators.low, space.n_estimators.high - 1)
        .int("max_depth", space.max_depth.low, space.max_depth.high - 1)
        .float("learning_rate", space.learning_rate.low, space.learning_rate.high)
        .int("num_leaves", space.num_leaves.low, space.num_leaves.high - 1)
        .categorical("boosting_type", space.boosting_type.iter().map(|b| b.to_string()))
}

fn int_param(params: &TrialParams, name: &str) -> Result<usize> {
    params
        .get(name)
        .and_then(ParameterValue::as_int)
        .filter(|v| *v >= 0)
        .map(|v| v as usize)
        .ok_or_else(|| PipelineError::ValidationError(format!("Missing or invalid integer parameter '{}'", name)))
}

/// Turn sampled parameters into a classifier configuration
pub fn params_to_config(params: &TrialParams, config: &ModelTrainingConfig) -> Result<GradientBoostingConfig> {
    let learning_rate = params
        .get("learning_rate")
        .and_then(ParameterValue::as_float)
        .ok_or_else(|| PipelineError::ValidationError("Missing parameter 'learning_rate'".to_string()))?;
    let boosting_type = params
        .get("boosting_type")
        .and_then(ParameterValue::as_string)
        .ok_or_else(|| PipelineError::ValidationError("Missing parameter 'boosting_type'".to_string()))
        .and_then(BoostingType::from_str)?;

    let booster = GradientBoostingConfig {
        n_estimators: int_param(params, "n_estimators")?,
        max_depth: Some(int_param(params, "max_depth")?),
        num_leaves: int_param(params, "num_leaves")?,
        learning_rate,
        boosting_type,
        min_child_samples: config.min_child_samples,
        max_bin: config.max_bin,
        random_state: Some(config.random_state),
        ..GradientBoostingConfig::default()
    };
    booster.validate()?;
    Ok(booster)
}

fn wrap<T>(step: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!(step, error = %e, "Training step failed");
        PipelineError::training(format!("{} failed", step), e)
    })
}

/// Searches, refits, evaluates and persists the classifier
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelTrainingConfig,
    target: String,
    paths: ArtifactPaths,
}

impl ModelTrainer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.model_training.clone(),
            target: config.data_processing.target_column.clone(),
            paths: config.paths.clone(),
        }
    }

    /// Read the processed files and split features from the target.
    ///
    /// Test features are taken in train's column order.
    pub fn load_and_split(&self) -> Result<TrainingData> {
        wrap("Loading data", self.read_processed())
    }

    fn read_processed(&self) -> Result<TrainingData> {
        let loader = DataLoader::new();
        let train = loader.load_csv(&self.paths.processed_train_file)?;
        let test = loader.load_csv(&self.paths.processed_test_file)?;

        for (frame, df) in [("train", &train), ("test", &test)] {
            if df.get_column_index(&self.target).is_none() {
                return Err(PipelineError::FeatureNotFound(format!(
                    "target column '{}' in {} data",
                    self.target, frame
                )));
            }
        }

        let feature_names = feature_columns(&train, &self.target);
        if feature_names.is_empty() {
            return Err(PipelineError::ValidationError("Train data has no feature columns".to_string()));
        }

        let data = TrainingData {
            x_train: columns_to_array2(&train, &feature_names)?,
            y_train: column_labels(&train, &self.target)?,
            x_test: columns_to_array2(&test, &feature_names)?,
            y_test: column_labels(&test, &self.target)?,
            feature_names,
        };
        info!(
            train_rows = data.x_train.nrows(),
            test_rows = data.x_test.nrows(),
            features = data.feature_names.len(),
            "Data split into features and target"
        );
        Ok(data)
    }

    /// Mean validation score of `booster` over precomputed folds
    pub fn cross_val_score(
        &self,
        booster: &GradientBoostingConfig,
        x: &Array2<f64>,
        y: &Array1<i64>,
        folds: &[CVSplit],
    ) -> Result<f64> {
        let mut total = 0.0;
        for fold in folds {
            let x_fit = x.select(Axis(0), &fold.train_indices);
            let y_fit = y.select(Axis(0), &fold.train_indices);
            let x_val = x.select(Axis(0), &fold.test_indices);
            let y_val = y.select(Axis(0), &fold.test_indices);

            let mut model = GradientBoostingClassifier::new(booster.clone());
            model.fit(&x_fit, &y_fit)?;
            let predicted = model.predict(&x_val)?;
            total += EvaluationMetrics::compute(&y_val, &predicted)?.get(self.config.scoring);
        }
        Ok(total / folds.len() as f64)
    }

    /// Randomized search with k-fold CV, then refit the best candidate on all rows
    pub fn train(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<TrainingOutcome> {
        wrap("Hyperparameter search", self.search_and_refit(x, y))
    }

    fn search_and_refit(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<TrainingOutcome> {
        let folds = StratifiedKFold::new(self.config.cv)
            .with_random_state(self.config.random_state)
            .split(y)?;

        info!(
            n_iter = self.config.n_iter,
            cv = self.config.cv,
            scoring = %self.config.scoring,
            "Starting randomized search"
        );

        let mut search = RandomSearch::new(
            build_search_space(&self.config),
            self.config.n_iter,
            Some(self.config.random_state),
        )
        .with_direction(OptimizeDirection::Maximize);

        let study = search.optimize(|params| {
            let booster = params_to_config(params, &self.config)?;
            self.cross_val_score(&booster, x, y, &folds)
        })?;

        let best = study.best_trial().ok_or_else(|| PipelineError::TrainingError {
            message: "Search finished without a successful trial".to_string(),
            source: None,
        })?;
        let best_params = best.params.clone();
        let cv_score = best.value.unwrap_or(f64::NAN);
        info!(
            cv_score,
            params = %format_params(&best_params),
            failed_trials = study.n_failed(),
            "Best parameters found"
        );

        let mut model = GradientBoostingClassifier::new(params_to_config(&best_params, &self.config)?);
        model.fit(x, y)?;
        info!(trees = model.n_trees(), "Refitted best model on all training rows");

        Ok(TrainingOutcome { model, best_params, cv_score })
    }

    /// Score `model` on held-out data
    pub fn evaluate(&self, model: &GradientBoostingClassifier, x: &Array2<f64>, y: &Array1<i64>) -> Result<EvaluationMetrics> {
        let metrics = wrap("Evaluation", model.predict(x).and_then(|p| EvaluationMetrics::compute(y, &p)))?;
        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            "Model evaluated"
        );
        Ok(metrics)
    }

    /// Write the artifact to the configured model path
    pub fn persist(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.paths.model_output_path.clone();
        wrap("Saving model", artifact.save(&path))?;
        Ok(path)
    }

    /// Load, search, evaluate and persist; returns the test metrics
    pub fn run(&self) -> Result<EvaluationMetrics> {
        let mut guard = StageGuard::new("training");

        let data = self.load_and_split()?;
        guard.step("load");

        let outcome = self.train(&data.x_train, &data.y_train)?;
        guard.step("search");

        let metrics = self.evaluate(&outcome.model, &data.x_test, &data.y_test)?;
        guard.step("evaluate");

        let metadata = metrics.to_map().into_iter().fold(
            ModelMetadata::new(MODEL_NAME)
                .with_model_type("gradient_boosting_classifier")
                .with_features(data.feature_names.clone())
                .with_target(self.target.clone())
                .with_hyperparameters(outcome.best_params.clone())
                .with_cv_score(outcome.cv_score),
            |meta, (name, value)| meta.add_metric(name, value),
        );
        let artifact = wrap("Building artifact", ModelArtifact::new(outcome.model, metadata))?;
        let path = self.persist(&artifact)?;
        guard.step("persist");

        info!(path = %path.display(), metrics = %metrics, "Training finished");
        guard.succeed();
        Ok(metrics)
    }
}
