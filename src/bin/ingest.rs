//! Fetch the raw dataset and write the train/test split

use booking_pipeline::config::PipelineConfig;
use booking_pipeline::ingestion::DataIngestion;
use booking_pipeline::utils::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PipelineConfig::load_default()?;
    DataIngestion::new(&config)?.run()?;
    Ok(())
}
