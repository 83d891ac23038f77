//! Tracing configuration and log routing.
//!
//! Logs go to stderr using a compact formatter so stdout stays free for reports. One-shot
//! commands only mirror logs to a file when `VAULTSCRIBE_LOG_FILE` is set; the long-running
//! server additionally defaults to `logs/vaultscribe.log`.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "VAULTSCRIBE_LOG_FILE";

/// How the process is running, which decides the default file logging behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Single command invocation; file logging is opt-in.
    Command,
    /// HTTP server; logs are persisted under `logs/` unless redirected.
    Server,
}

/// Configure tracing subscribers for stderr and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Uses a global guard to keep the non‑blocking writer alive for the process lifetime.
pub fn init_tracing(mode: LogMode) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    if let Some(writer) = configure_file_writer(mode) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

fn configure_file_writer(mode: LogMode) -> Option<NonBlocking> {
    match std::env::var(LOG_FILE_ENV).ok().filter(|path| !path.trim().is_empty()) {
        Some(path) => append_to(Path::new(&path)),
        None if mode == LogMode::Server => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            let file_appender = tracing_appender::rolling::never("logs", "vaultscribe.log");
            Some(install(tracing_appender::non_blocking(file_appender)))
        }
        None => None,
    }
}

fn append_to(path: &Path) -> Option<NonBlocking> {
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(install(tracing_appender::non_blocking(file))),
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}

fn install((writer, guard): (NonBlocking, WorkerGuard)) -> NonBlocking {
    let _ = LOG_GUARD.set(guard);
    writer
}
