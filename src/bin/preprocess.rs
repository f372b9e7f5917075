//! Turn the train/test split into model-ready files

use booking_pipeline::config::PipelineConfig;
use booking_pipeline::preprocessing::DataProcessor;
use booking_pipeline::utils::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PipelineConfig::load_default()?;
    let summary = DataProcessor::new(&config).process()?;
    tracing::info!(selected = ?summary.selected_features, "Preprocessing finished");
    Ok(())
}
