mod app;
mod commands;
mod config;
mod error;
mod event;
mod forms;
mod guard;
mod logging;
mod portal;
mod query;
mod router;
mod session;
mod storage;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sportal")]
#[command(about = "A terminal client for the supplier portal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/sportal/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Portal base URL, overrides `portal.url`
  #[arg(long)]
  portal_url: Option<String>,

  /// Directory for log files (default: the data directory)
  #[arg(long)]
  log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override portal URL if specified on command line
  if let Some(url) = args.portal_url {
    config.portal.url = url;
  }

  let data_dir = config::Config::data_dir()?;
  let log_dir = args.log_dir.unwrap_or_else(|| data_dir.clone());
  let _log_guard = logging::init(&log_dir, &config.log.level)?;
  info!(portal = %config.portal.url, "starting");

  let storage = Arc::new(storage::SqliteStorage::open(&data_dir)?);

  // Initialize and run the app
  let mut app = app::App::new(config, storage)?;
  app.run().await?;

  Ok(())
}
