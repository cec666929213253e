//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{PipelineError, Result};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|_| PipelineError::Invalid("invalid log level directive"))?,
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| PipelineError::Invalid("logging already initialized"))
}
