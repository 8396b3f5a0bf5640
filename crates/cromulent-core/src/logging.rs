//! Logging infrastructure for cromulent.
//!
//! Structured logging using the `tracing` ecosystem. Console output goes to
//! stderr so that reports written to stdout stay pipeable; an optional JSON
//! lines file keeps a machine-readable trace of every estimate.
//!
//! ## Example
//!
//! ```no_run
//! use cromulent_core::logging;
//!
//! let _guard = logging::init_logging(None, 0).expect("logging init");
//!
//! tracing::info!("estimate started");
//! tracing::debug!(task = "wf.align", shard = 3, "pricing shard");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{CoreError, Result};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the cromulent logging system.
///
/// This sets up:
/// - Console logging to stderr (compact, human-readable)
/// - File logging to `<log_dir>/cromulent.log` (JSON lines), when a log
///   directory is given
///
/// `verbosity` follows the `-v` count of the CLI: 0 logs `info` for
/// cromulent crates, 1 logs `debug`, 2 and more also let `debug` records
/// from dependencies through. `RUST_LOG` overrides all of it.
pub fn init_logging(log_dir: Option<PathBuf>, verbosity: u8) -> Result<LogGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(verbosity)));

    let verbose = verbosity > 0;
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    let (file_layer, file_guard) = match &log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| CoreError::DirectoryCreation {
                path: dir.clone(),
                source: e,
            })?;

            let file_appender = tracing_appender::rolling::daily(dir, "cromulent.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_span_list(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = ?log_dir, verbosity, "logging initialized");

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Build the `EnvFilter` directives for a `-v` count.
pub fn filter_directives(verbosity: u8) -> String {
    match verbosity {
        0 => "cromulent=info,cromulent_core=info,cromulent_cost=info,cromulent_client=info".to_string(),
        1 => "cromulent=debug,cromulent_core=debug,cromulent_cost=debug,cromulent_client=debug"
            .to_string(),
        2 => "info,cromulent=debug,cromulent_core=debug,cromulent_cost=debug,cromulent_client=debug"
            .to_string(),
        _ => "debug".to_string(),
    }
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Get the default log directory path.
///
/// Returns `~/.cromulent/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(CoreError::NoHomeDirectory)?;
    Ok(home.join(".cromulent").join("logs"))
}
