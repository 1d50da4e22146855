//! Logging setup for the t2m binary
//!
//! Everything goes to stderr through `tracing-subscriber`, so stdout stays
//! free for command output. The filter honors `RUST_LOG` first, then the
//! configured level; HTTP client internals are capped at `warn` unless
//! `RUST_LOG` says otherwise.
//!
//! # Examples
//!
//! ```no_run
//! use libt2m::logging::{LoggingConfig, LogFormat};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//!
//! // Or honor T2M_LOG_FORMAT / T2M_LOG_LEVEL
//! LoggingConfig::from_env(false).init();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Crates whose debug output drowns ours
const NOISY_CRATES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "megalodon"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain lines, no colors
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line with colors and source locations
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Forces `debug`
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Format and level from `T2M_LOG_FORMAT` and `T2M_LOG_LEVEL`, falling
    /// back to text at `info`
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var("T2M_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);
        let level = std::env::var("T2M_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self::new(format, level, verbose)
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        let level = if self.verbose { "debug" } else { self.level.as_str() };
        let mut directives = vec![level.to_string()];
        directives.extend(NOISY_CRATES.iter().map(|name| format!("{}=warn", name)));
        directives.join(",")
    }

    /// Install the global subscriber.
    ///
    /// Does nothing if one is already installed, so tests can call it
    /// repeatedly.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directives()));

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .try_init(),
        };

        if result.is_err() {
            tracing::debug!("Logging already initialized");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.contains("Invalid log format: 'xml'"));
    }

    #[test]
    fn test_log_format_display() {
        assert_eq!(LogFormat::Text.to_string(), "text");
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn test_directives() {
        let config = LoggingConfig::new(LogFormat::Text, "warn".to_string(), false);
        let directives = config.directives();
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("reqwest=warn"));

        let verbose = LoggingConfig::new(LogFormat::Text, "warn".to_string(), true);
        assert!(verbose.directives().starts_with("debug,"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("T2M_LOG_FORMAT", "json");
        std::env::set_var("T2M_LOG_LEVEL", "error");
        let config = LoggingConfig::from_env(false);
        std::env::remove_var("T2M_LOG_FORMAT");
        std::env::remove_var("T2M_LOG_LEVEL");

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "error");

        let config = LoggingConfig::from_env(true);
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.level, "info");
        assert!(config.verbose);
    }
}
