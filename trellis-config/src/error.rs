// Failures of the configuration layers

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key '{0}' is not set")]
    MissingKey(String),

    #[error("Configuration file '{}' is not .json or .toml", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Cannot read configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} configuration: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    /// A value that cannot be represented as JSON.
    #[error("Configuration value cannot be stored: {0}")]
    Encode(String),

    /// Stored values that do not fit the requested type.
    #[error("Configuration does not match the expected shape: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn parse(format: &'static str, message: impl ToString) -> Self {
        ConfigError::Parse {
            format,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
