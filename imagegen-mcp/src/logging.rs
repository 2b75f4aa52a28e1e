//! Tracing setup for the server binary
//!
//! Logs go to `imagegen.log` under the platform log directory, or to stderr
//! when the file can't be opened. Stdout carries the stdio transport and is
//! never written to.

use config::PathManager;
use std::sync::{Once, OnceLock};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        l @ ("trace" | "debug" | "info" | "warn" | "error") => l.to_string(),
        _ => "info".to_string(),
    };
    format!("{0},imagegen_core={0},imagegen_mcp={0}", level)
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(level: &str) {
    INIT.call_once(|| {
        let Some(path) = PathManager::log_file_path() else {
            init_stderr_logging(level);
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("[imagegen] Failed to create log directory {:?}: {}", parent, e);
            }
        }

        let file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("[imagegen] Failed to open log file {:?}: {}", path, e);
                init_stderr_logging(level);
                return;
            }
        };

        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let _ = LOG_GUARD.set(guard);

        let subscriber = tracing_subscriber::registry().with(filter(level)).with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        );

        match tracing::subscriber::set_global_default(subscriber) {
            Ok(()) => tracing::info!("Logging initialized, writing to {:?}", path),
            Err(e) => eprintln!("[imagegen] Failed to set tracing subscriber: {}", e),
        }
    });
}

fn init_stderr_logging(level: &str) {
    let subscriber = tracing_subscriber::registry().with(filter(level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
