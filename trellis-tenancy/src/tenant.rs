//! Tenant records and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use trellis_core::names::normalize_names;
use uuid::Uuid;

/// Recipe assigned to tenants created without one.
pub const DEFAULT_RECIPE_NAME: &str = "SaaS.Base";

/// Database provider assigned to tenants created without one.
pub const DEFAULT_DATABASE_PROVIDER: &str = "Sqlite";

/// Lifecycle state of a tenant.
///
/// `Uninitialized` only leaves through the setup action; `Running` and
/// `Disabled` are mutually reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TenantState {
    #[default]
    Uninitialized,
    Running,
    Disabled,
}

impl TenantState {
    pub fn is_running(&self) -> bool {
        matches!(self, TenantState::Running)
    }

    pub fn is_removable(&self) -> bool {
        matches!(self, TenantState::Disabled | TenantState::Uninitialized)
    }
}

impl fmt::Display for TenantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantState::Uninitialized => write!(f, "Uninitialized"),
            TenantState::Running => write!(f, "Running"),
            TenantState::Disabled => write!(f, "Disabled"),
        }
    }
}

/// A tenant as held by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub name: String,
    pub state: TenantState,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub request_url_host: String,
    #[serde(default)]
    pub request_url_prefix: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recipe_name: String,
    #[serde(default)]
    pub database_provider: String,
    #[serde(default)]
    pub feature_profiles: Vec<String>,
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// A fresh `Uninitialized` tenant with a generated secret.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into().trim().to_string(),
            state: TenantState::Uninitialized,
            is_default: false,
            request_url_host: String::new(),
            request_url_prefix: String::new(),
            category: String::new(),
            description: String::new(),
            recipe_name: DEFAULT_RECIPE_NAME.to_string(),
            database_provider: DEFAULT_DATABASE_PROVIDER.to_string(),
            feature_profiles: Vec::new(),
            secret: Uuid::new_v4().simple().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The permanent default tenant, created `Running`.
    pub fn default_tenant(name: impl Into<String>) -> Self {
        let mut tenant = Self::new(name);
        tenant.is_default = true;
        tenant.state = TenantState::Running;
        tenant
    }

    pub fn with_request_url_host(mut self, host: impl AsRef<str>) -> Self {
        self.request_url_host = normalize_host(host.as_ref());
        self
    }

    pub fn with_request_url_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.request_url_prefix = normalize_prefix(prefix.as_ref());
        self
    }

    pub fn with_state(mut self, state: TenantState) -> Self {
        self.state = state;
        self
    }

    pub fn with_feature_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.feature_profiles = normalize_names(profiles);
        self
    }

    /// Registry key: names are unique case-insensitively.
    pub fn key(&self) -> String {
        tenant_key(&self.name)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    pub fn has_profile(&self, profile_id: &str) -> bool {
        self.feature_profiles
            .iter()
            .any(|p| p.eq_ignore_ascii_case(profile_id))
    }

    /// Host and prefix the tenant answers on, if it declares either.
    pub fn url_binding(&self) -> Option<(String, String)> {
        if self.request_url_host.is_empty() && self.request_url_prefix.is_empty() {
            return None;
        }
        Some((
            self.request_url_host.to_lowercase(),
            self.request_url_prefix.to_lowercase(),
        ))
    }

    pub fn to_item(&self) -> TenantItem {
        TenantItem {
            name: self.name.clone(),
            state: self.state,
            is_default: self.is_default,
            request_url_host: self.request_url_host.clone(),
            request_url_prefix: self.request_url_prefix.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            recipe_name: self.recipe_name.clone(),
            database_provider: self.database_provider.clone(),
            feature_profiles: self.feature_profiles.clone(),
        }
    }
}

/// Public view of a tenant. Never includes the secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantItem {
    pub name: String,
    pub state: TenantState,
    pub is_default: bool,
    pub request_url_host: String,
    pub request_url_prefix: String,
    pub category: String,
    pub description: String,
    pub recipe_name: String,
    pub database_provider: String,
    pub feature_profiles: Vec<String>,
}

pub fn tenant_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Request url prefixes are stored without surrounding slashes.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}

pub fn normalize_host(host: &str) -> String {
    host.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tenant_defaults() {
        let tenant = Tenant::new("  Acme ");
        assert_eq!(tenant.name, "Acme");
        assert_eq!(tenant.state, TenantState::Uninitialized);
        assert_eq!(tenant.recipe_name, DEFAULT_RECIPE_NAME);
        assert_eq!(tenant.database_provider, DEFAULT_DATABASE_PROVIDER);
        assert_eq!(tenant.secret.len(), 32);
        assert!(!tenant.is_default);
    }

    #[test]
    fn test_default_tenant_is_running() {
        let tenant = Tenant::default_tenant("Default");
        assert!(tenant.is_default);
        assert!(tenant.state.is_running());
    }

    #[test]
    fn test_state_predicates() {
        assert!(TenantState::Disabled.is_removable());
        assert!(TenantState::Uninitialized.is_removable());
        assert!(!TenantState::Running.is_removable());
        assert_eq!(TenantState::Running.to_string(), "Running");
    }

    #[test]
    fn test_prefix_and_profiles_normalized() {
        let tenant = Tenant::new("acme")
            .with_request_url_prefix("/acme/")
            .with_feature_profiles([" basic", "Basic", ""]);
        assert_eq!(tenant.request_url_prefix, "acme");
        assert_eq!(tenant.feature_profiles, vec!["basic"]);
        assert!(tenant.has_profile("BASIC"));
    }

    #[test]
    fn test_url_binding() {
        assert_eq!(Tenant::new("a").url_binding(), None);
        let tenant = Tenant::new("a").with_request_url_prefix("A");
        assert_eq!(tenant.url_binding(), Some((String::new(), "a".to_string())));
    }

    #[test]
    fn test_item_hides_secret() {
        let tenant = Tenant::new("acme");
        let json = serde_json::to_value(tenant.to_item()).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["state"], "Uninitialized");
        assert_eq!(json["isDefault"], false);
        assert_eq!(json["recipeName"], "SaaS.Base");
    }
}
