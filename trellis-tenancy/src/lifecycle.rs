//! Tenant lifecycle state machine.
//!
//! ```text
//! create ──> Uninitialized ──(setup)──> Running <──> Disabled
//!                 │                                     │
//!                 └──────────────(remove)───────────────┴──> removed
//! ```

use crate::context::ContextProvider;
use crate::registry::TenantRegistry;
use crate::tenant::{
    DEFAULT_DATABASE_PROVIDER, DEFAULT_RECIPE_NAME, Tenant, TenantState, normalize_host,
    normalize_prefix,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use trellis_core::names::{
    REMOVE_OPERATION, is_remove_operation, non_blank, normalize_names,
};
use trellis_core::{ManagementError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTenantRequest {
    pub name: String,
    pub request_url_host: Option<String>,
    pub request_url_prefix: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub database_provider: Option<String>,
    pub recipe_name: Option<String>,
    pub feature_profiles: Option<Vec<String>>,
}

impl CreateTenantRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_request_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request_url_prefix = Some(prefix.into());
        self
    }

    pub fn with_request_url_host(mut self, host: impl Into<String>) -> Self {
        self.request_url_host = Some(host.into());
        self
    }

    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.recipe_name = Some(recipe.into());
        self
    }

    pub fn with_feature_profiles(mut self, profiles: Vec<String>) -> Self {
        self.feature_profiles = Some(profiles);
        self
    }
}

/// Partial update of a tenant. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchTenantRequest {
    pub request_url_host: Option<String>,
    pub request_url_prefix: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub feature_profiles: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub operation: Option<String>,
}

impl PatchTenantRequest {
    pub fn enable() -> Self {
        Self {
            enabled: Some(true),
            ..Self::default()
        }
    }

    pub fn disable() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    pub fn remove() -> Self {
        Self {
            operation: Some(REMOVE_OPERATION.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    Updated(Tenant),
    Removed(String),
}

pub struct TenantManager {
    registry: Arc<TenantRegistry>,
    contexts: Arc<dyn ContextProvider>,
    default_recipe: String,
}

impl TenantManager {
    pub fn new(registry: Arc<TenantRegistry>, contexts: Arc<dyn ContextProvider>) -> Self {
        Self {
            registry,
            contexts,
            default_recipe: DEFAULT_RECIPE_NAME.to_string(),
        }
    }

    pub fn with_default_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.default_recipe = recipe.into();
        self
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    /// Lifecycle operations are only served to the default tenant.
    pub fn require_default_caller(&self, caller: &Tenant) -> Result<()> {
        if caller.is_default {
            Ok(())
        } else {
            Err(ManagementError::forbidden(
                "Tenant management is only available from the default tenant.",
            ))
        }
    }

    pub fn list(&self) -> Vec<Tenant> {
        self.registry.list()
    }

    pub fn create(&self, request: CreateTenantRequest) -> Result<Tenant> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ManagementError::invalid("Tenant name is required."));
        }

        let mut tenant = Tenant::new(name)
            .with_request_url_host(request.request_url_host.unwrap_or_default())
            .with_request_url_prefix(request.request_url_prefix.unwrap_or_default())
            .with_feature_profiles(request.feature_profiles.unwrap_or_default());
        tenant.category = request.category.unwrap_or_default().trim().to_string();
        tenant.description = request.description.unwrap_or_default().trim().to_string();
        tenant.recipe_name = non_blank(request.recipe_name.as_deref())
            .unwrap_or_else(|| self.default_recipe.clone());
        tenant.database_provider = non_blank(request.database_provider.as_deref())
            .unwrap_or_else(|| DEFAULT_DATABASE_PROVIDER.to_string());

        let tenant = self.registry.insert(tenant)?;
        info!(tenant = %tenant.name, "Tenant created");
        Ok(tenant)
    }

    pub fn patch(&self, name: &str, request: PatchTenantRequest) -> Result<PatchOutcome> {
        if is_remove_operation(request.operation.as_deref())? {
            return self.remove(name);
        }

        let (tenant, disabled) = self.registry.update(name, |tenant| {
            if let Some(host) = &request.request_url_host {
                tenant.request_url_host = normalize_host(host);
            }
            if let Some(prefix) = &request.request_url_prefix {
                tenant.request_url_prefix = normalize_prefix(prefix);
            }
            if let Some(category) = &request.category {
                tenant.category = category.trim().to_string();
            }
            if let Some(description) = &request.description {
                tenant.description = description.trim().to_string();
            }
            if let Some(profiles) = &request.feature_profiles {
                tenant.feature_profiles = normalize_names(profiles);
            }

            let previous = tenant.state;
            match (request.enabled, previous) {
                (Some(true), TenantState::Uninitialized) => {
                    return Err(ManagementError::invalid(
                        "Uninitialized tenant must be setup before enabling.",
                    ));
                }
                (Some(true), TenantState::Disabled) => tenant.state = TenantState::Running,
                (Some(false), TenantState::Running) if tenant.is_default => {
                    return Err(ManagementError::invalid("Default tenant cannot be disabled."));
                }
                (Some(false), TenantState::Running) => tenant.state = TenantState::Disabled,
                _ => {}
            }
            Ok(previous != tenant.state && tenant.state == TenantState::Disabled)
        })?;

        self.contexts.evict(&tenant.name);
        if disabled {
            info!(tenant = %tenant.name, "Tenant disabled");
        }
        info!(tenant = %tenant.name, state = %tenant.state, "Tenant updated");
        Ok(PatchOutcome::Updated(tenant))
    }

    fn remove(&self, name: &str) -> Result<PatchOutcome> {
        let removed = self.registry.remove_if(name, |tenant| {
            if tenant.is_default {
                return Err(ManagementError::invalid("Default tenant cannot be removed."));
            }
            if !tenant.state.is_removable() {
                return Err(ManagementError::invalid(
                    "Only disabled or uninitialized tenants can be removed.",
                )
                .with_detail("state", tenant.state.to_string()));
            }
            Ok(())
        })?;

        self.contexts.discard(&removed.name);
        info!(tenant = %removed.name, "Tenant removed");
        Ok(PatchOutcome::Removed(removed.name))
    }

    /// Completion of the external setup action: `Uninitialized` → `Running`.
    pub fn complete_setup(&self, name: &str) -> Result<Tenant> {
        let (tenant, ()) = self.registry.update(name, |tenant| {
            if tenant.state != TenantState::Uninitialized {
                return Err(ManagementError::invalid(format!(
                    "Tenant '{}' is already set up.",
                    tenant.name
                ))
                .with_detail("state", tenant.state.to_string()));
            }
            tenant.state = TenantState::Running;
            Ok(())
        })?;

        self.contexts.evict(&tenant.name);
        info!(tenant = %tenant.name, "Tenant setup completed");
        Ok(tenant)
    }
}
