//! Trellis Logging
//!
//! Installs a `tracing` subscriber for the management host. Every other
//! crate in the workspace logs through the `tracing` macros re-exported here.
//!
//! # Environment Variables
//!
//! - `TRELLIS_DEBUG=1` - Force debug level
//! - `TRELLIS_LOG_LEVEL=trace|debug|info|warn|error` - Set log level
//! - `TRELLIS_LOG_FORMAT=json|pretty|compact` - Set output format (default json)
//! - `RUST_LOG` - Full filter directive, wins over the level when present
//!
//! # Usage
//!
//! ```rust,no_run
//! use trellis_log::{LogConfig, info};
//!
//! LogConfig::from_env().init();
//! info!(tenant = "Default", "Host started");
//! ```

use std::env;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use tracing::{Level, debug, error, info, instrument, trace, warn};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid filter directive: {0}")]
    InvalidFilter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Get level from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Convert to string for EnvFilter
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for structured logging
    #[default]
    Json,
    /// Multi-line human readable format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            "compact" | "plain" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: LogLevel,
    format: LogFormat,
    targets: bool,
    env_filter: Option<String>,
}

impl Default for LogConfig {
    /// JSON to stdout at INFO level
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            targets: true,
            env_filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from `TRELLIS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup("TRELLIS_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let level = if debug {
            LogLevel::Debug
        } else {
            lookup("TRELLIS_LOG_LEVEL")
                .and_then(|s| LogLevel::parse(&s))
                .unwrap_or_default()
        };

        let format = lookup("TRELLIS_LOG_FORMAT")
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            level,
            format,
            ..Self::default()
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Use an explicit filter directive such as `trellis_tenancy=debug,info`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn current_level(&self) -> LogLevel {
        self.level
    }

    pub fn current_format(&self) -> LogFormat {
        self.format
    }

    fn build_filter(&self) -> Result<EnvFilter, LogError> {
        match &self.env_filter {
            Some(directive) => {
                EnvFilter::try_new(directive).map_err(|e| LogError::InvalidFilter(e.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber, failing if one is already set.
    pub fn try_init(self) -> Result<(), LogError> {
        let filter = self.build_filter()?;
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(self.targets))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_target(self.targets))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_target(self.targets))
                .try_init(),
        };

        result.map_err(|e| LogError::AlreadyInitialized(e.to_string()))
    }

    /// Install the global subscriber; a second call is ignored.
    pub fn init(self) {
        if let Err(err) = self.try_init() {
            eprintln!("trellis-log: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config.current_level(), LogLevel::Info);
        assert_eq!(config.current_format(), LogFormat::Json);
    }

    #[test]
    fn test_env_overrides() {
        let config = LogConfig::from_lookup(lookup(&[
            ("TRELLIS_LOG_LEVEL", "WARN"),
            ("TRELLIS_LOG_FORMAT", "pretty"),
        ]));
        assert_eq!(config.current_level(), LogLevel::Warn);
        assert_eq!(config.current_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_debug_flag_wins() {
        let config = LogConfig::from_lookup(lookup(&[
            ("TRELLIS_DEBUG", "true"),
            ("TRELLIS_LOG_LEVEL", "error"),
        ]));
        assert_eq!(config.current_level(), LogLevel::Debug);
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
        assert_eq!(LogLevel::Error.as_str(), "error");
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let config = LogConfig::new().with_env_filter("trellis=loud");
        assert!(matches!(config.try_init(), Err(LogError::InvalidFilter(_))));
    }
}
