//! Train, evaluate and persist the classifier from the processed files

use booking_pipeline::config::PipelineConfig;
use booking_pipeline::training::ModelTrainer;
use booking_pipeline::utils::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PipelineConfig::load_default()?;
    let metrics = ModelTrainer::new(&config).run()?;
    tracing::info!(%metrics, "Training finished");
    Ok(())
}
