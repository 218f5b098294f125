pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

use tracing_subscriber::EnvFilter;

/// Install the log subscriber. Logs go to stderr so stdout stays machine-readable.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
