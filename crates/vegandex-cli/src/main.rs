//! vegandex - terminal client for vegandex accounts.
//!
//! Signs in, registers, signs out and shows the current session, using the
//! same session lifecycle the mobile app runs on.

mod cli;
mod commands;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vegandex_core::{open_credential_store, ApiClient, Config, SessionManager};

use cli::Cli;

/// Log file name in the cache directory
const LOG_FILE: &str = "vegandex.log";

/// Non-blocking writer for the log file in the cache directory, if it can be opened.
fn log_file_writer(config: &Config) -> Option<(NonBlocking, WorkerGuard)> {
    let dir = config.cache_dir().ok()?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

/// Initialize the tracing subscriber for logging.
///
/// Stderr gets `RUST_LOG`-filtered output (default `warn`); the log file in the
/// cache directory gets the core and CLI at `debug`.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_filter(filter);

    let (file_layer, guard) = match log_file_writer(config) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("vegandex_core=debug,vegandex=debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let command = Cli::parse().into_command();

    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({e:#}), using defaults");
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };

    let _log_guard = init_tracing(&config);

    info!(api = %config.api_base_url(), backend = ?config.credential_backend, "vegandex starting");

    let api = Arc::new(ApiClient::from_config(&config)?);
    let store = open_credential_store(&config)?;
    let manager = SessionManager::new(api, store);
    manager.initialize().await;

    let mut config = config;
    let ok = commands::run(command, &manager, &mut config).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
