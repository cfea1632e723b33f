// Built-in recipe steps

use crate::descriptor::RecipeStep;
use crate::executor::{RecipeStepHandler, step_errors};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use trellis_features::{FeatureToggleRequest, TenantFeatures, toggle_features};
use trellis_identity::{CreateRoleRequest, RolePermissionsRequest, RoleService};
use trellis_settings::{SiteSettingsPatch, SiteSettingsService};

/// `feature` step: `{ "enable": [...], "disable": [...] }`.
pub struct FeatureStep {
    features: Arc<TenantFeatures>,
}

impl FeatureStep {
    pub fn new(features: Arc<TenantFeatures>) -> Self {
        Self { features }
    }
}

#[async_trait]
impl RecipeStepHandler for FeatureStep {
    fn name(&self) -> &str {
        "feature"
    }

    async fn execute(&self, step: &RecipeStep) -> Result<(), Vec<String>> {
        let request = FeatureToggleRequest {
            tenant: None,
            enable: step.strings("enable"),
            disable: step.strings("disable"),
            force: true,
        };
        toggle_features(&self.features, &request)
            .await
            .map(|_| ())
            .map_err(|e| step_errors(&e))
    }
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    name: String,
    #[serde(default)]
    permissions: Vec<String>,
}

/// `roles` step: `{ "roles": [{ "name": "...", "permissions": [...] }] }`.
///
/// Existing roles get their permission set replaced.
pub struct RolesStep {
    roles: Arc<RoleService>,
}

impl RolesStep {
    pub fn new(roles: Arc<RoleService>) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl RecipeStepHandler for RolesStep {
    fn name(&self) -> &str {
        "roles"
    }

    async fn execute(&self, step: &RecipeStep) -> Result<(), Vec<String>> {
        let entries: Vec<RoleEntry> =
            serde_json::from_value(step.get("roles").cloned().unwrap_or(Value::Array(vec![])))
                .map_err(|e| vec![format!("Invalid roles step: {}", e)])?;

        for entry in entries {
            let existing = self
                .roles
                .list()
                .await
                .map_err(|e| step_errors(&e))?
                .into_iter()
                .find(|r| r.name.eq_ignore_ascii_case(entry.name.trim()));

            let result = match existing {
                Some(role) => self
                    .roles
                    .update_permissions(
                        &role.id,
                        RolePermissionsRequest {
                            permission_names: entry.permissions,
                        },
                    )
                    .await
                    .map(|_| ()),
                None => self
                    .roles
                    .create(CreateRoleRequest::new(entry.name).with_permissions(entry.permissions))
                    .await
                    .map(|_| ()),
            };
            result.map_err(|e| step_errors(&e))?;
        }
        Ok(())
    }
}

/// `settings` step: a site settings patch.
pub struct SettingsStep {
    site: Arc<SiteSettingsService>,
}

impl SettingsStep {
    pub fn new(site: Arc<SiteSettingsService>) -> Self {
        Self { site }
    }
}

#[async_trait]
impl RecipeStepHandler for SettingsStep {
    fn name(&self) -> &str {
        "settings"
    }

    async fn execute(&self, step: &RecipeStep) -> Result<(), Vec<String>> {
        let patch: SiteSettingsPatch = serde_json::from_value(Value::Object(step.data.clone()))
            .map_err(|e| vec![format!("Invalid settings step: {}", e)])?;
        self.site
            .update(&patch)
            .map(|_| ())
            .map_err(|e| step_errors(&e))
    }
}
