// Configuration validation

use crate::{ConfigError, Result};

/// Implemented by typed settings that can reject themselves after loading.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Small helpers shared by `Validate` implementations.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(key: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "'{}' must not be empty",
                key
            )));
        }
        Ok(())
    }

    pub fn starts_with(key: &str, value: &str, prefix: &str) -> Result<()> {
        if !value.starts_with(prefix) {
            return Err(ConfigError::Invalid(format!(
                "'{}' must start with '{}'",
                key, prefix
            )));
        }
        Ok(())
    }

    pub fn min_len(key: &str, value: &str, min: usize) -> Result<()> {
        if value.len() < min {
            return Err(ConfigError::Invalid(format!(
                "'{}' must be at least {} characters",
                key, min
            )));
        }
        Ok(())
    }
}
