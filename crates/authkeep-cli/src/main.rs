//! authkeep - sign in to the gallery service from the terminal.
//!
//! Keeps the session token in the configured store between runs, so later
//! commands are authenticated until the server rejects the token.

mod commands;
mod navigator;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use authkeep_core::{ApiClient, Config, SessionStore};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;
use navigator::TerminalNavigator;

/// Log file name prefix inside `AUTHKEEP_LOG_DIR`
const LOG_FILE_PREFIX: &str = "authkeep.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var("AUTHKEEP_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env();
    info!(base_url = %config.base_url, backend = ?config.token_backend, "authkeep starting");

    let tokens = config.token_store()?;
    let navigator = Arc::new(TerminalNavigator::new(
        command.route(&config),
        config.routes.login.clone(),
    ));
    let api = ApiClient::new(&config, tokens, navigator)?;
    let session = SessionStore::create(api, &config);

    let ok = commands::run(&session, command).await?;

    if !ok {
        // Let a scheduled login redirect print its hint before exiting
        tokio::time::sleep(config.redirect_delay() * 2).await;
    }
    session.dispose();

    if !ok {
        // exit() skips destructors; flush the log file first
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
