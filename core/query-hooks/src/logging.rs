//! Diagnostics setup for query-hooks.
//!
//! stdout carries query results and stderr carries the summary line, so
//! diagnostics stay quiet (`warn`) unless asked for. `--debug` or a truthy
//! `OBSERVATORY_DEBUG_LOG` forces `debug`; otherwise `RUST_LOG` applies.
//! With `log_file` configured, diagnostics go to that file instead of stderr.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "OBSERVATORY_DEBUG_LOG";
const DEFAULT_LEVEL: &str = "warn";

/// Installs the global subscriber. The returned guard flushes the file
/// writer on drop and must live until exit.
pub fn init(debug: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = build_filter(debug || debug_env_enabled());

    let Some(log_file) = log_file else {
        init_stderr(filter);
        return None;
    };

    let (directory, file_name) = match (log_file.parent(), log_file.file_name()) {
        (Some(directory), Some(file_name)) => (directory, file_name),
        _ => {
            init_stderr(filter);
            tracing::warn!(path = %log_file.display(), "Invalid log file path, logging to stderr");
            return None;
        }
    };
    if let Err(err) = fs_err::create_dir_all(directory) {
        init_stderr(filter);
        tracing::warn!(error = %err, "Failed to create log directory, logging to stderr");
        return None;
    }

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
    Some(guard)
}

fn init_stderr(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    }
}

fn debug_env_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "YES"] {
            assert!(is_truthy(value), "{} should enable debug", value);
        }
        for value in ["", "0", "false", "no", "True"] {
            assert!(!is_truthy(value), "{} should not enable debug", value);
        }
    }

    #[test]
    fn debug_flag_overrides_environment() {
        assert_eq!(build_filter(true).to_string(), "debug");
    }
}
