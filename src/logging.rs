//! # Logging Setup
//!
//! Installs the global `tracing` subscriber.
//!
//! `RUST_LOG` overrides the configured level. When a log directory is
//! configured, output goes to a daily-rotated file through a non-blocking
//! writer instead of stdout.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// File name prefix of rotated log files
pub const LOG_FILE_PREFIX: &str = "thermostat-link.log";

/// Build the level filter for a configuration
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initialize logging
///
/// # Returns
///
/// * `Option<WorkerGuard>` - Present when logging to a file; keep it alive
///   until exit so buffered lines are flushed
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = env_filter(config);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_uses_configured_level() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "debug".to_string(),
            log_dir: None,
        };

        let filter = env_filter(&config);
        assert!(filter.to_string().contains("debug"));
    }
}
