//! Standardised `tracing` logging setup shared by every Ironflow binary.
//!
//! ## Usage
//! ```rust,ignore
//! ironflow_core::logging::init_logging();
//! tracing::info!("engine started");
//! ```
//!
//! ```bash
//! RUST_LOG=ironflow_engine=debug,ironflow_execution=info ironflow run
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialises human-readable logging, honouring `RUST_LOG` with an `INFO` default.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialises JSON logging for aggregators, honouring `RUST_LOG` with an `INFO` default.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}
