//! Logging setup
//!
//! Installs a `tracing-subscriber` fmt subscriber driven by [`DebugConfig`].
//! `RUST_LOG` overrides the configured level when set.

use crate::config::{DebugConfig, LogLevel};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

impl LogLevel {
    /// Filter directive for this level
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Initialize the global subscriber.
///
/// Returns `false` if a subscriber was already installed (tests and embedding
/// hosts may set their own), which is not treated as an error.
pub fn init(config: &DebugConfig) -> bool {
    let filter = env_filter(config.log_level);

    if config.log_to_file {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_path)
        {
            Ok(file) => {
                return tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init()
                    .is_ok();
            }
            Err(e) => {
                eprintln!(
                    "Failed to open log file {}: {}, logging to stderr",
                    config.log_path.display(),
                    e
                );
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filters() {
        assert_eq!(LogLevel::Off.as_filter(), "off");
        assert_eq!(LogLevel::default().as_filter(), "info");
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
    }
}
