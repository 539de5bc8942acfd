pub mod browse;
pub mod cli;
pub mod config;
pub mod favorites;
pub mod models;
pub mod tmdb;
pub mod utils;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the compact `tracing` formatter, honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}
