// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Toml => "TOML",
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(FileFormat::from_extension)
            .map(Self::new)
            .ok_or_else(|| ConfigError::UnsupportedFile(path.to_path_buf()))
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse(&content)
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::parse(self.format.name(), e))
            }
            FileFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::parse(self.format.name(), e))?;

                serde_json::to_value(toml_value).map_err(|e| ConfigError::Encode(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let result = loader.parse(r#"{"default_tenant": "Default"}"#).unwrap();
        assert_eq!(result["default_tenant"], "Default");
    }

    #[test]
    fn test_parse_toml_with_tables() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let content = r#"
            bind_address = "127.0.0.1:5080"
            disable_admin_path_access = false

            [[api_keys]]
            name = "ops"
            sha256 = "abc"
            permissions = ["*"]
        "#;

        let result = loader.parse(content).unwrap();
        assert_eq!(result["bind_address"], "127.0.0.1:5080");
        assert_eq!(result["disable_admin_path_access"], false);
        assert_eq!(result["api_keys"][0]["permissions"][0], "*");
    }

    #[test]
    fn test_auto_detect() {
        assert!(ConfigLoader::auto("trellis.toml").is_ok());
        assert!(ConfigLoader::auto("trellis.json").is_ok());
        assert!(matches!(
            ConfigLoader::auto("trellis.yaml"),
            Err(ConfigError::UnsupportedFile(path)) if path == Path::new("trellis.yaml")
        ));
        assert!(ConfigLoader::auto("trellis").is_err());
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = ConfigLoader::new(FileFormat::Toml)
            .load_file("/nonexistent/trellis.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/trellis.toml"));
    }

    #[test]
    fn test_invalid_content() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        assert!(matches!(
            loader.parse("= broken"),
            Err(ConfigError::Parse { format: "TOML", .. })
        ));
    }
}
