//! File logging. The terminal belongs to the UI, so log lines go to a
//! daily-rolled file in the data directory.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_PREFIX: &str = "sportal.log";

/// Build the filter: `RUST_LOG` wins, then the configured level.
fn env_filter(default_level: &str) -> EnvFilter {
  EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(default_level))
    .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the program or buffered lines are lost on exit.
pub fn init(log_dir: &Path, default_level: &str) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(log_dir, LOG_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(env_filter(default_level))
    .with(
      fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}
