use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

// stdout carries protocol output, so every subscriber writes to stderr.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

pub fn setup_simple_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Other(e.to_string()))
}

pub fn setup_json_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .try_init()
        .map_err(|e| Error::Other(e.to_string()))
}
