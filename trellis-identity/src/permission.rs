// Permission catalog assembled from feature providers

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub name: String,
    pub description: String,
    pub category: String,
}

impl Permission {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
        }
    }
}

/// Supplies the permissions a feature contributes to a tenant.
pub trait PermissionProvider: Send + Sync {
    fn permissions(&self) -> Vec<Permission>;
}

/// Fixed list of permissions.
pub struct StaticPermissionProvider {
    permissions: Vec<Permission>,
}

impl StaticPermissionProvider {
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self { permissions }
    }
}

impl PermissionProvider for StaticPermissionProvider {
    fn permissions(&self) -> Vec<Permission> {
        self.permissions.clone()
    }
}

/// Read-only union of a tenant's permission providers.
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    permissions: Vec<Permission>,
}

impl PermissionCatalog {
    /// De-duplicated by name (first provider wins), sorted by category then name.
    pub fn from_providers(providers: &[Arc<dyn PermissionProvider>]) -> Self {
        let mut seen = HashSet::new();
        let mut permissions: Vec<Permission> = providers
            .iter()
            .flat_map(|provider| provider.permissions())
            .filter(|p| seen.insert(p.name.to_lowercase()))
            .collect();

        permissions.sort_by(|a, b| {
            a.category
                .to_lowercase()
                .cmp(&b.category.to_lowercase())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Self { permissions }
    }

    pub fn list(&self) -> &[Permission] {
        &self.permissions
    }

    /// Canonical name of a permission, matched case-insensitively.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.permissions
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .map(|p| p.name.as_str())
    }

    /// Split names into known canonical names and unknown names.
    pub fn partition(&self, names: &[String]) -> (Vec<String>, Vec<String>) {
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.canonical(name) {
                Some(canonical) => known.push(canonical.to_string()),
                None => unknown.push(name.clone()),
            }
        }
        (known, unknown)
    }
}
