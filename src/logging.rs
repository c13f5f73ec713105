//! Tracing subscriber setup shared by the binaries.
//!
//! Log lines are written through a non-blocking appender and pass through
//! [`SanitizingMakeWriter`] before reaching the sink. The filter defaults to
//! `info` and honours `RUST_LOG`.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::sanitize::SanitizingMakeWriter;
use crate::config::{LogConfig, LogMode};
use crate::{LifebeatError, Result};

/// Resolve `Auto` against the current terminal.
///
/// Interactive sessions log to the file so command output on the terminal
/// stays readable; anything else logs to stderr so container log
/// collectors see it and stdout stays reserved for command output.
#[must_use]
pub fn effective_mode(mode: LogMode, interactive: bool) -> LogMode {
    match mode {
        LogMode::Auto if interactive => LogMode::File,
        LogMode::Auto => LogMode::Stderr,
        other => other,
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines on drop and must be held for
/// the lifetime of the process.
///
/// # Errors
/// Returns `Io` if the log file cannot be opened, or `Config` if a global
/// subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<WorkerGuard> {
    let mode = effective_mode(config.mode, std::io::stdout().is_terminal());

    let (writer, guard) = match mode {
        LogMode::File => {
            let file = open_log_file(&config.file)?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogMode::Stderr | LogMode::Auto => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .try_init()
        .map_err(|e| LifebeatError::Config(format!("Logging already initialized: {e}")))?;

    Ok(guard)
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
