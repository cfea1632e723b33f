// OpenId scope management

use crate::store::{OpenIdScope, OpenIdStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use trellis_core::names::{contains_ignore_case, is_remove_operation, non_blank, normalize_names};
use trellis_core::{ManagementError, Result};
use uuid::Uuid;

/// Prefix of the resource value reserved for a tenant.
pub const TENANT_RESOURCE_PREFIX: &str = "oct:";

pub fn reserved_resource(tenant: &str) -> String {
    format!("{}{}", TENANT_RESOURCE_PREFIX, tenant)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeItem {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub resources: Vec<String>,
}

impl From<OpenIdScope> for ScopeItem {
    fn from(scope: OpenIdScope) -> Self {
        Self {
            id: scope.id,
            name: scope.name,
            display_name: scope.display_name,
            description: scope.description,
            resources: scope.resources,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateScopeRequest {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchScopeRequest {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub resources: Option<Vec<String>>,
    pub operation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopePatchOutcome {
    Updated(ScopeItem),
    Removed(String),
}

/// Scope operations for one tenant.
pub struct ScopeService {
    store: Arc<dyn OpenIdStore>,
    reserved: String,
}

impl ScopeService {
    pub fn new(store: Arc<dyn OpenIdStore>, tenant: &str) -> Self {
        Self {
            store,
            reserved: reserved_resource(tenant),
        }
    }

    pub fn reserved(&self) -> &str {
        &self.reserved
    }

    fn resources(&self, resources: &[String]) -> Result<Vec<String>> {
        let resources = normalize_names(resources);
        if contains_ignore_case(&resources, &self.reserved) {
            return Err(ManagementError::invalid(
                "Resources cannot contain the current tenant reserved value.",
            )
            .with_detail("reservedResource", &self.reserved));
        }
        Ok(resources)
    }

    async fn ensure_unique_name(&self, name: &str, own_id: Option<&str>) -> Result<()> {
        let taken = self
            .store
            .scopes()
            .await?
            .into_iter()
            .any(|s| s.name.eq_ignore_ascii_case(name) && Some(s.id.as_str()) != own_id);
        if taken {
            return Err(ManagementError::conflict(format!(
                "Scope '{}' already exists.",
                name
            )));
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ScopeItem>> {
        let mut scopes = self.store.scopes().await?;
        scopes.sort_by_key(|s| s.name.to_lowercase());
        Ok(scopes.into_iter().map(ScopeItem::from).collect())
    }

    pub async fn create(&self, request: CreateScopeRequest) -> Result<ScopeItem> {
        let (Some(name), Some(display_name)) = (
            non_blank(Some(request.name.as_str())),
            non_blank(Some(request.display_name.as_str())),
        ) else {
            return Err(ManagementError::invalid(
                "Scope Name and DisplayName are required.",
            ));
        };

        let scope = OpenIdScope {
            id: Uuid::new_v4().simple().to_string(),
            name,
            display_name,
            description: request
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            resources: self.resources(&request.resources)?,
        };
        self.ensure_unique_name(&scope.name, None).await?;

        self.store.save_scope(scope.clone()).await?;
        info!(scope = %scope.name, "OpenId scope created");
        Ok(scope.into())
    }

    pub async fn patch(&self, id: &str, request: PatchScopeRequest) -> Result<ScopePatchOutcome> {
        let current =
            self.store.find_scope(id).await?.ok_or_else(|| {
                ManagementError::not_found(format!("Scope '{}' was not found.", id))
            })?;

        if is_remove_operation(request.operation.as_deref())? {
            self.store.delete_scope(&current.id).await?;
            info!(scope = %current.name, "OpenId scope removed");
            return Ok(ScopePatchOutcome::Removed(current.id));
        }

        let mut draft = current.clone();
        if let Some(name) = &request.name {
            draft.name = non_blank(Some(name.as_str()))
                .ok_or_else(|| ManagementError::invalid("Scope name cannot be empty."))?;
        }
        if let Some(display_name) = &request.display_name {
            draft.display_name = non_blank(Some(display_name.as_str())).ok_or_else(|| {
                ManagementError::invalid("Scope display name cannot be empty.")
            })?;
        }
        if let Some(description) = &request.description {
            draft.description = description.trim().to_string();
        }
        if let Some(resources) = &request.resources {
            draft.resources = self.resources(resources)?;
        }

        if !draft.name.eq_ignore_ascii_case(&current.name) {
            self.ensure_unique_name(&draft.name, Some(&current.id)).await?;
        }

        self.store.save_scope(draft.clone()).await?;
        info!(scope = %draft.name, "OpenId scope updated");
        Ok(ScopePatchOutcome::Updated(draft.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryOpenIdStore;
    use serde_json::json;

    fn request(name: &str, resources: &[&str]) -> CreateScopeRequest {
        CreateScopeRequest {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            description: None,
            resources: resources.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let service = ScopeService::new(Arc::new(InMemoryOpenIdStore::new()), "Acme");
        service.create(request("reports", &["reports-api"])).await.unwrap();
        service.create(request("api", &[" api ", "API"])).await.unwrap();

        let scopes = service.list().await.unwrap();
        assert_eq!(scopes[0].name, "api");
        assert_eq!(scopes[0].resources, vec!["api"]);
        assert_eq!(scopes[1].name, "reports");
    }

    #[tokio::test]
    async fn test_reserved_resource_rejected() {
        let service = ScopeService::new(Arc::new(InMemoryOpenIdStore::new()), "Acme");
        let err = service
            .create(request("api", &["OCT:acme"]))
            .await
            .unwrap_err();

        assert_eq!(
            err.message(),
            "Resources cannot contain the current tenant reserved value."
        );
        assert_eq!(err.detail("reservedResource").unwrap(), &json!("oct:Acme"));
    }

    #[tokio::test]
    async fn test_another_tenants_token_allowed() {
        let service = ScopeService::new(Arc::new(InMemoryOpenIdStore::new()), "Acme");
        let scope = service
            .create(request("api", &["oct:Globex"]))
            .await
            .unwrap();
        assert_eq!(scope.resources, vec!["oct:Globex"]);
    }

    #[tokio::test]
    async fn test_patch() {
        let service = ScopeService::new(Arc::new(InMemoryOpenIdStore::new()), "Acme");
        let api = service.create(request("api", &[])).await.unwrap();
        service.create(request("profile", &[])).await.unwrap();

        let err = service
            .patch(
                &api.id,
                PatchScopeRequest {
                    name: Some("Profile".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let err = service
            .patch(
                "api",
                PatchScopeRequest {
                    resources: Some(vec!["oct:Acme".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let outcome = service
            .patch(
                "api",
                PatchScopeRequest {
                    description: Some("  Public API ".into()),
                    resources: Some(vec!["api-resource".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ScopePatchOutcome::Updated(updated) = outcome else {
            panic!("expected update");
        };
        assert_eq!(updated.description, "Public API");
        assert_eq!(updated.resources, vec!["api-resource"]);

        let outcome = service
            .patch(
                &api.id,
                PatchScopeRequest {
                    operation: Some("remove".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, ScopePatchOutcome::Removed(api.id));
    }
}
