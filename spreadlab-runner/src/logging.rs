//! Logging initialization.
//!
//! Environment variables:
//! - `RUST_LOG`: standard tracing filter (e.g. `info`, `spreadlab_runner=debug`)
//! - `LOG_LEVEL`: default level when `RUST_LOG` is unset
//! - `LOG_FORMAT`: `pretty` (default), `compact`, or `json`
//!
//! Logs go to stderr so stdout stays free for the run summary.

use std::env;

use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub default_level: String,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_level: "info".to_string(),
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read `LOG_FORMAT`, `LOG_LEVEL` and `LOG_LOCATION`.
    pub fn from_env() -> Self {
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_location: env::var("LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_falls_back_to_pretty() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("fancy"), LogFormat::Pretty);
    }

    #[test]
    fn level_override() {
        let config = LogConfig::default().with_default_level("debug");
        assert_eq!(config.default_level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
