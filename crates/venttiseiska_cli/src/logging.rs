//! Logging system setup.
//!
//! Initializes `tracing-subscriber` with either human-readable or JSON output.

use anyhow::bail;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set. Logs go to stderr
/// so the report on stdout stays machine-readable.
pub fn setup_logging(level: &str, json_format: bool) -> anyhow::Result<()> {
    if !VALID_LEVELS.contains(&level) {
        bail!("Invalid log level: {level}. Must be one of: {VALID_LEVELS:?}");
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", level);
    Ok(())
}
