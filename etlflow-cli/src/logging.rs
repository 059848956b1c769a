//! Subscriber installation: console, debug file and error file.

use etlflow::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Debug log file name prefix; the appender adds a date suffix.
pub const DEBUG_LOG: &str = "etl_debug.log";
/// Error-only log file name.
pub const ERROR_LOG: &str = "etl_errors.log";

/// Keeps the file writers flushing until dropped.
#[must_use = "dropping the guards stops file logging"]
pub struct LogGuards {
    _debug: WorkerGuard,
    _error: WorkerGuard,
}

/// Picks the console filter directive.
///
/// `-v` raises the configured level to debug, `-vv` to trace. `RUST_LOG`
/// wins over both.
pub fn console_directive(level: &str, verbosity: u8) -> String {
    match verbosity {
        0 => level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber.
pub fn init(config: &LoggingConfig, verbosity: u8) -> anyhow::Result<LogGuards> {
    std::fs::create_dir_all(&config.dir)?;

    let directive = console_directive(&config.level, verbosity);
    let console_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directive))?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (debug_writer, debug_guard) = file_writer(&config.dir, DEBUG_LOG, true);
    let debug_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(debug_writer)
        .with_filter(EnvFilter::new("debug"));

    let (error_writer, error_guard) = file_writer(&config.dir, ERROR_LOG, false);
    let error_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(error_writer)
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(debug_layer)
        .with(error_layer)
        .try_init()?;

    Ok(LogGuards {
        _debug: debug_guard,
        _error: error_guard,
    })
}

fn file_writer(
    dir: &Path,
    name: &str,
    daily: bool,
) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    if daily {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name))
    } else {
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_console_directive() {
        assert_eq!(console_directive("info", 0), "info");
        assert_eq!(console_directive("warn", 0), "warn");
        assert_eq!(console_directive("info", 1), "debug");
        assert_eq!(console_directive("info", 3), "trace");
    }
}
