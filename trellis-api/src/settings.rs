// Validated host configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use trellis_config::{ConfigError, ConfigManager, ConfigValidator, Validate};
use trellis_tenancy::DEFAULT_RECIPE_NAME;

/// Environment prefix of host configuration variables.
pub const ENV_PREFIX: &str = "TRELLIS";

/// A management API key. The token itself is never stored, only its
/// SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeySettings {
    pub name: String,
    pub sha256: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub bind_address: String,
    pub default_tenant: String,
    pub management_prefix: String,
    pub admin_base_path: String,
    pub disable_admin_path_access: bool,
    pub allow_anonymous_management_api: bool,
    pub api_keys: Vec<ApiKeySettings>,
    pub recipes_path: Option<PathBuf>,
    pub tenants_file: Option<PathBuf>,
    pub default_recipe: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5080".to_string(),
            default_tenant: "Default".to_string(),
            management_prefix: "/api/management".to_string(),
            admin_base_path: "/Admin".to_string(),
            disable_admin_path_access: true,
            allow_anonymous_management_api: false,
            api_keys: Vec::new(),
            recipes_path: None,
            tenants_file: None,
            default_recipe: DEFAULT_RECIPE_NAME.to_string(),
        }
    }
}

impl HostSettings {
    /// Extract, validate and normalize the host settings from `config`.
    pub fn load(config: &ConfigManager) -> trellis_config::Result<Self> {
        let settings: HostSettings = config.load_validated()?;
        Ok(settings.normalized())
    }

    /// Defaults, then `trellis.toml` when present, then `.env`, then
    /// `TRELLIS_*` variables.
    pub fn from_environment() -> trellis_config::Result<Self> {
        let config = ConfigManager::with_prefix(ENV_PREFIX);
        config.load_optional_file("trellis.toml")?;
        config.load_dotenv(None)?;
        config.load_env()?;
        Self::load(&config)
    }

    pub fn normalized(mut self) -> Self {
        self.admin_base_path = normalize_path(&self.admin_base_path);
        self.management_prefix = normalize_path(&self.management_prefix);
        self.default_tenant = self.default_tenant.trim().to_string();
        self.default_recipe = self.default_recipe.trim().to_string();
        self
    }

    pub fn socket_addr(&self) -> trellis_config::Result<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            ConfigError::Invalid(format!("'bind_address' is invalid: {}", e))
        })
    }

    pub fn with_api_key(mut self, key: ApiKeySettings) -> Self {
        self.api_keys.push(key);
        self
    }

    pub fn with_anonymous_access(mut self, allow: bool) -> Self {
        self.allow_anonymous_management_api = allow;
        self
    }
}

impl Validate for HostSettings {
    fn validate(&self) -> trellis_config::Result<()> {
        self.socket_addr()?;
        ConfigValidator::not_empty("default_tenant", &self.default_tenant)?;
        ConfigValidator::not_empty("default_recipe", &self.default_recipe)?;
        ConfigValidator::starts_with("management_prefix", self.management_prefix.trim(), "/")?;
        if normalize_path(&self.management_prefix) == "/" {
            return Err(ConfigError::Invalid(
                "'management_prefix' must not be the root path".to_string(),
            ));
        }

        for key in &self.api_keys {
            ConfigValidator::not_empty("api_keys.name", &key.name)?;
            ConfigValidator::min_len("api_keys.sha256", key.sha256.trim(), 64)?;
            if !key.sha256.trim().chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid(format!(
                    "'api_keys.sha256' of key '{}' must be a hex digest",
                    key.name
                )));
            }
        }
        Ok(())
    }
}

/// Leading `/`, no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}
