//! Utility functions and types

pub mod data_loader;
pub mod frame;
mod timer;

pub use data_loader::{write_atomic, DataLoader, DataSaver};
pub use timer::{StageGuard, Timer};

use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "booking_pipeline=info";

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .try_init();
}
