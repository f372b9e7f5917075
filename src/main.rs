//! Runs the whole training pipeline

use booking_pipeline::config::PipelineConfig;
use booking_pipeline::pipeline::TrainingPipeline;
use booking_pipeline::utils::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PipelineConfig::load_default()?;
    let metrics = TrainingPipeline::new(config).run()?;

    tracing::info!(%metrics, "Pipeline finished");
    Ok(())
}
