// Role management

use crate::permission::PermissionCatalog;
use crate::provider::{IdentityProvider, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use trellis_core::names::{
    is_remove_operation, normalize_names, set_difference, sort_ignore_case,
};
use trellis_core::{ManagementError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleItem {
    pub id: String,
    pub name: String,
    pub permission_names: Vec<String>,
}

impl From<Role> for RoleItem {
    fn from(role: Role) -> Self {
        let mut permission_names = role.permissions;
        sort_ignore_case(&mut permission_names);
        Self {
            id: role.id,
            name: role.name,
            permission_names,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRoleRequest {
    pub name: String,
    pub permission_names: Option<Vec<String>>,
}

impl CreateRoleRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_permissions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permission_names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchRoleRequest {
    pub name: Option<String>,
    pub operation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolePermissionsRequest {
    pub permission_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RolePatchOutcome {
    Updated(RoleItem),
    Removed(String),
}

/// Role operations against one tenant's identity provider.
pub struct RoleService {
    identity: Arc<dyn IdentityProvider>,
    permissions: Arc<PermissionCatalog>,
}

impl RoleService {
    pub fn new(identity: Arc<dyn IdentityProvider>, permissions: Arc<PermissionCatalog>) -> Self {
        Self {
            identity,
            permissions,
        }
    }

    async fn require(&self, id_or_name: &str) -> Result<Role> {
        self.identity
            .find_role(id_or_name)
            .await?
            .ok_or_else(|| ManagementError::not_found(format!("Role '{}' was not found.", id_or_name)))
    }

    fn known_permissions(&self, names: &[String]) -> Result<Vec<String>> {
        let (known, unknown) = self.permissions.partition(&normalize_names(names));
        if unknown.is_empty() {
            Ok(known)
        } else {
            Err(
                ManagementError::invalid("Unknown permission names detected.")
                    .with_detail("unknownPermissions", unknown),
            )
        }
    }

    pub async fn list(&self) -> Result<Vec<RoleItem>> {
        let mut roles: Vec<RoleItem> = self
            .identity
            .roles()
            .await?
            .into_iter()
            .map(RoleItem::from)
            .collect();
        roles.sort_by_key(|r| r.name.to_lowercase());
        Ok(roles)
    }

    pub async fn create(&self, request: CreateRoleRequest) -> Result<RoleItem> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ManagementError::invalid("Role name is required."));
        }
        if self.identity.find_role(name).await?.is_some() {
            return Err(ManagementError::conflict(format!(
                "Role '{}' already exists.",
                name
            )));
        }
        let permissions = match &request.permission_names {
            Some(names) => self.known_permissions(names)?,
            None => Vec::new(),
        };

        let role = self.identity.create_role(name).await?;
        if permissions.is_empty() {
            info!(role = %role.name, "Role created");
            return Ok(role.into());
        }

        match self
            .identity
            .update_role_permissions(&role.id, &permissions, &[])
            .await
        {
            Ok(role) => {
                info!(role = %role.name, "Role created");
                Ok(role.into())
            }
            Err(err) => {
                warn!(role = %role.name, error = %err, "Rolling back role creation");
                self.identity.delete_role(&role.id).await?;
                Err(err)
            }
        }
    }

    pub async fn patch(&self, id: &str, request: PatchRoleRequest) -> Result<RolePatchOutcome> {
        let role = self.require(id).await?;

        if is_remove_operation(request.operation.as_deref())? {
            self.identity.delete_role(&role.id).await?;
            info!(role = %role.name, "Role removed");
            return Ok(RolePatchOutcome::Removed(role.id));
        }

        let Some(name) = request.name else {
            return Ok(RolePatchOutcome::Updated(role.into()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ManagementError::invalid("Role name cannot be empty."));
        }
        if let Some(existing) = self.identity.find_role(name).await?
            && existing.id != role.id
        {
            return Err(ManagementError::conflict(format!(
                "Role '{}' already exists.",
                name
            )));
        }

        let renamed = self.identity.rename_role(&role.id, name).await?;
        Ok(RolePatchOutcome::Updated(renamed.into()))
    }

    /// Replace the role's permission set.
    pub async fn update_permissions(
        &self,
        id: &str,
        request: RolePermissionsRequest,
    ) -> Result<RoleItem> {
        let role = self.require(id).await?;
        let target = self.known_permissions(&request.permission_names)?;
        let (to_add, to_remove) = set_difference(&role.permissions, &target);

        let updated = self
            .identity
            .update_role_permissions(&role.id, &to_add, &to_remove)
            .await?;
        info!(
            role = %updated.name,
            added = to_add.len(),
            removed = to_remove.len(),
            "Role permissions updated"
        );
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{Permission, PermissionProvider, StaticPermissionProvider};
    use crate::provider::InMemoryIdentityProvider;

    fn service() -> (RoleService, Arc<InMemoryIdentityProvider>) {
        let providers: Vec<Arc<dyn PermissionProvider>> =
            vec![Arc::new(StaticPermissionProvider::new(vec![
                Permission::new("ManageUsers", "Manage users", "Security"),
                Permission::new("ManageRoles", "Manage roles", "Security"),
                Permission::new("ViewContent", "View content", "Content"),
            ]))];
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let service = RoleService::new(
            identity.clone(),
            Arc::new(PermissionCatalog::from_providers(&providers)),
        );
        (service, identity)
    }

    #[tokio::test]
    async fn test_create_with_permissions() {
        let (service, _) = service();
        let role = service
            .create(CreateRoleRequest::new("  Editor ").with_permissions(["viewcontent", "ManageUsers"]))
            .await
            .unwrap();

        assert_eq!(role.name, "Editor");
        assert_eq!(role.permission_names, vec!["ManageUsers", "ViewContent"]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, identity) = service();
        let err = service.create(CreateRoleRequest::new("  ")).await.unwrap_err();
        assert_eq!(err.message(), "Role name is required.");

        let err = service
            .create(CreateRoleRequest::new("Editor").with_permissions(["ManageUsers", "Fly"]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.detail("unknownPermissions").unwrap(), &serde_json::json!(["Fly"]));
        assert!(identity.roles().await.unwrap().is_empty());

        service.create(CreateRoleRequest::new("Editor")).await.unwrap();
        let err = service.create(CreateRoleRequest::new("EDITOR")).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_patch_rename_and_remove() {
        let (service, _) = service();
        let editor = service.create(CreateRoleRequest::new("Editor")).await.unwrap();
        service.create(CreateRoleRequest::new("Author")).await.unwrap();

        let err = service
            .patch(&editor.id, PatchRoleRequest { name: Some(" ".into()), operation: None })
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Role name cannot be empty.");

        let err = service
            .patch(&editor.id, PatchRoleRequest { name: Some("author".into()), operation: None })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let outcome = service
            .patch("editor", PatchRoleRequest { name: Some("Reviewer".into()), operation: None })
            .await
            .unwrap();
        assert!(matches!(outcome, RolePatchOutcome::Updated(ref r) if r.name == "Reviewer"));

        let outcome = service
            .patch(&editor.id, PatchRoleRequest { name: None, operation: Some("remove".into()) })
            .await
            .unwrap();
        assert_eq!(outcome, RolePatchOutcome::Removed(editor.id.clone()));

        let err = service
            .patch(&editor.id, PatchRoleRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_update_permissions_reconciles() {
        let (service, _) = service();
        let role = service
            .create(CreateRoleRequest::new("Editor").with_permissions(["ManageUsers", "ViewContent"]))
            .await
            .unwrap();

        let updated = service
            .update_permissions(
                &role.id,
                RolePermissionsRequest {
                    permission_names: vec!["ViewContent".into(), "ManageRoles".into()],
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.permission_names, vec!["ManageRoles", "ViewContent"]);

        let err = service
            .update_permissions(
                &role.id,
                RolePermissionsRequest { permission_names: vec!["Nope".into()] },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        let unchanged = service.list().await.unwrap();
        assert_eq!(unchanged[0].permission_names, vec!["ManageRoles", "ViewContent"]);
    }
}
