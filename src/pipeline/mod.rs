//! End-to-end driver

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingestion::DataIngestion;
use crate::preprocessing::DataProcessor;
use crate::training::{EvaluationMetrics, ModelTrainer};
use crate::utils::StageGuard;

/// Runs ingestion, preprocessing and training in order, stopping at the first error
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<EvaluationMetrics> {
        let mut guard = StageGuard::new("pipeline");

        DataIngestion::new(&self.config)?.run()?;
        guard.step("ingestion");

        DataProcessor::new(&self.config).process()?;
        guard.step("preprocessing");

        let metrics = ModelTrainer::new(&self.config).run()?;
        guard.step("training");

        guard.succeed();
        Ok(metrics)
    }
}
