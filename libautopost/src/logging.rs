//! Logging setup shared by the library tests and the `autopost` binary
//!
//! Logs always go to stderr so that command output on stdout stays
//! machine-readable. Format and level come from:
//! - `AUTOPOST_LOG_FORMAT`: `text` (default), `json` or `pretty`
//! - `AUTOPOST_LOG_LEVEL`: any `EnvFilter` directive, `info` by default
//! - `RUST_LOG`, which wins over the level when set
//!
//! # Examples
//!
//! ```no_run
//! use libautopost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "debug".to_string(), false)
//!     .try_init()
//!     .expect("logging already initialized");
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

pub const FORMAT_ENV: &str = "AUTOPOST_LOG_FORMAT";
pub const LEVEL_ENV: &str = "AUTOPOST_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text without colors
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::InvalidValue {
                field: FORMAT_ENV.to_string(),
                message: format!("'{}' is not one of text, json, pretty", s),
            }),
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

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Forces `debug` unless `RUST_LOG` says otherwise
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

    /// Read format and level from the `AUTOPOST_LOG_*` variables
    ///
    /// An unparseable format falls back to text.
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var(FORMAT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let level = std::env::var(LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

        Self::new(format, level, verbose)
    }

    fn filter(&self) -> Result<EnvFilter, ConfigError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let directive = if self.verbose { "debug" } else { self.level.as_str() };
        EnvFilter::try_new(directive).map_err(|e| ConfigError::InvalidValue {
            field: LEVEL_ENV.to_string(),
            message: e.to_string(),
        })
    }

    /// Install the global subscriber
    ///
    /// Fails if the level directive is invalid or a subscriber is already set.
    pub fn try_init(&self) -> Result<(), ConfigError> {
        let filter = self.filter()?;

        let installed = match self.format {
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
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false)
                .try_init(),
        };

        installed.map_err(|e| ConfigError::InvalidValue {
            field: "logging".to_string(),
            message: e.to_string(),
        })
    }
}
