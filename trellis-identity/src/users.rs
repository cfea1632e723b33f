// User management

use crate::provider::{IdentityProvider, NewUser, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use trellis_core::names::{
    is_remove_operation, non_blank, normalize_names, set_difference, sort_ignore_case,
};
use trellis_core::{ManagementError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserItem {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub is_enabled: bool,
    pub email_confirmed: bool,
    pub role_names: Vec<String>,
}

impl From<User> for UserItem {
    fn from(user: User) -> Self {
        let mut role_names = user.roles;
        sort_ignore_case(&mut role_names);
        Self {
            id: user.id,
            user_name: user.user_name,
            email: user.email,
            is_enabled: user.is_enabled,
            email_confirmed: user.email_confirmed,
            role_names,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_enabled: Option<bool>,
    pub role_names: Option<Vec<String>>,
}

impl CreateUserRequest {
    pub fn new(
        user_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            user_name: Some(user_name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_names = Some(roles.into_iter().map(Into::into).collect());
        self
    }
}

/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_enabled: Option<bool>,
    pub role_names: Option<Vec<String>>,
    pub operation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserPatchOutcome {
    Updated(UserItem),
    Removed(String),
}

/// User operations against one tenant's identity provider.
pub struct UserService {
    identity: Arc<dyn IdentityProvider>,
}

impl UserService {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    async fn require(&self, id_or_name: &str) -> Result<User> {
        self.identity
            .find_user(id_or_name)
            .await?
            .ok_or_else(|| ManagementError::not_found(format!("User '{}' was not found.", id_or_name)))
    }

    async fn reload(&self, id: &str, user_name: &str, action: &str) -> Result<UserItem> {
        self.identity
            .find_user(id)
            .await?
            .map(UserItem::from)
            .ok_or_else(|| {
                ManagementError::problem(format!(
                    "User '{}' was {} but could not be reloaded.",
                    user_name, action
                ))
            })
    }

    /// Canonical role names, or `unknownRoles` when any is missing.
    async fn known_roles(&self, names: &[String]) -> Result<Vec<String>> {
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        for name in normalize_names(names) {
            match self.identity.find_role(&name).await? {
                Some(role) => known.push(role.name),
                None => unknown.push(name),
            }
        }
        if unknown.is_empty() {
            Ok(known)
        } else {
            Err(ManagementError::invalid("Unknown role names detected.")
                .with_detail("unknownRoles", unknown))
        }
    }

    pub async fn list(&self) -> Result<Vec<UserItem>> {
        let mut users: Vec<UserItem> = self
            .identity
            .users()
            .await?
            .into_iter()
            .map(UserItem::from)
            .collect();
        users.sort_by_key(|u| u.user_name.to_lowercase());
        Ok(users)
    }

    pub async fn create(&self, request: CreateUserRequest) -> Result<UserItem> {
        let (Some(user_name), Some(email), Some(password)) = (
            non_blank(request.user_name.as_deref()),
            non_blank(request.email.as_deref()),
            request.password.filter(|p| !p.trim().is_empty()),
        ) else {
            return Err(ManagementError::invalid(
                "UserName, Email and Password are required.",
            ));
        };

        if self.identity.find_user(&user_name).await?.is_some() {
            return Err(ManagementError::conflict(format!(
                "User '{}' already exists.",
                user_name
            )));
        }
        let roles = match &request.role_names {
            Some(names) => self.known_roles(names).await?,
            None => Vec::new(),
        };

        let user = self
            .identity
            .create_user(NewUser {
                user_name,
                email,
                password,
                email_confirmed: true,
                is_enabled: request.is_enabled.unwrap_or(true),
            })
            .await?;

        if !roles.is_empty()
            && let Err(err) = self.identity.update_user_roles(&user.id, &roles, &[]).await
        {
            warn!(user = %user.user_name, error = %err, "Rolling back user creation");
            self.identity.delete_user(&user.id).await?;
            return Err(err);
        }

        info!(user = %user.user_name, roles = roles.len(), "User created");
        self.reload(&user.id, &user.user_name, "created").await
    }

    pub async fn patch(&self, id: &str, request: PatchUserRequest) -> Result<UserPatchOutcome> {
        let user = self.require(id).await?;

        if is_remove_operation(request.operation.as_deref())? {
            self.identity.delete_user(&user.id).await?;
            info!(user = %user.user_name, "User removed");
            return Ok(UserPatchOutcome::Removed(user.id));
        }

        if let Some(password) = &request.password {
            self.identity.validate_password(password)?;
        }
        let role_changes = match &request.role_names {
            Some(names) => {
                let target = self.known_roles(names).await?;
                Some(set_difference(&user.roles, &target))
            }
            None => None,
        };

        if let Some(email) = &request.email {
            self.identity.set_email(&user.id, email.trim()).await?;
        }
        if let Some(password) = &request.password {
            self.identity.reset_password(&user.id, password).await?;
        }
        if let Some(enabled) = request.is_enabled {
            self.identity.set_enabled(&user.id, enabled).await?;
        }
        if let Some((to_add, to_remove)) = role_changes {
            self.identity
                .update_user_roles(&user.id, &to_add, &to_remove)
                .await?;
        }

        let item = self.reload(&user.id, &user.user_name, "updated").await?;
        Ok(UserPatchOutcome::Updated(item))
    }
}
