// Identity provider abstraction and in-memory implementation

use crate::password::{PasswordHasher, PasswordPolicy};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use trellis_core::names::contains_ignore_case;
use trellis_core::{ManagementError, Result};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub email_confirmed: bool,
    pub is_enabled: bool,
    pub password_hash: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub email_confirmed: bool,
    pub is_enabled: bool,
}

/// Per-tenant user and role storage.
///
/// Lookups by `id_or_name` match the id first, then the name
/// case-insensitively.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn roles(&self) -> Result<Vec<Role>>;
    async fn find_role(&self, id_or_name: &str) -> Result<Option<Role>>;
    async fn create_role(&self, name: &str) -> Result<Role>;
    async fn rename_role(&self, id: &str, name: &str) -> Result<Role>;
    /// Deleting a role also drops it from every user.
    async fn delete_role(&self, id: &str) -> Result<()>;
    async fn update_role_permissions(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<Role>;

    async fn users(&self) -> Result<Vec<User>>;
    async fn find_user(&self, id_or_name: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn delete_user(&self, id: &str) -> Result<()>;
    async fn set_email(&self, id: &str, email: &str) -> Result<()>;
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()>;
    async fn reset_password(&self, id: &str, password: &str) -> Result<()>;
    async fn update_user_roles(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;

    /// Check a password against the provider's policy without storing it.
    fn validate_password(&self, password: &str) -> Result<()>;
}

fn role_not_found(id: &str) -> ManagementError {
    ManagementError::not_found(format!("Role '{}' was not found.", id))
}

fn user_not_found(id: &str) -> ManagementError {
    ManagementError::not_found(format!("User '{}' was not found.", id))
}

/// Identity store kept in process memory.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    roles: RwLock<Vec<Role>>,
    users: RwLock<Vec<User>>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Verify a user's password.
    pub fn check_password(&self, id_or_name: &str, password: &str) -> bool {
        let users = self.users.read();
        users
            .iter()
            .find(|u| u.id == id_or_name || u.user_name.eq_ignore_ascii_case(id_or_name))
            .map(|u| self.hasher.verify(password, &u.password_hash))
            .unwrap_or(false)
    }

    fn with_user<R>(&self, id: &str, apply: impl FnOnce(&mut User) -> R) -> Result<R> {
        let mut users = self.users.write();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| user_not_found(id))?;
        Ok(apply(user))
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.read().clone())
    }

    async fn find_role(&self, id_or_name: &str) -> Result<Option<Role>> {
        let roles = self.roles.read();
        let found = roles
            .iter()
            .find(|r| r.id == id_or_name)
            .or_else(|| roles.iter().find(|r| r.name.eq_ignore_ascii_case(id_or_name)));
        Ok(found.cloned())
    }

    async fn create_role(&self, name: &str) -> Result<Role> {
        let mut roles = self.roles.write();
        if roles.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
            return Err(ManagementError::conflict(format!(
                "Role '{}' already exists.",
                name
            )));
        }
        let role = Role {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            permissions: Vec::new(),
        };
        roles.push(role.clone());
        Ok(role)
    }

    async fn rename_role(&self, id: &str, name: &str) -> Result<Role> {
        let mut roles = self.roles.write();
        if roles
            .iter()
            .any(|r| r.id != id && r.name.eq_ignore_ascii_case(name))
        {
            return Err(ManagementError::conflict(format!(
                "Role '{}' already exists.",
                name
            )));
        }
        let role = roles
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| role_not_found(id))?;
        let previous = std::mem::replace(&mut role.name, name.to_string());
        let renamed = role.clone();
        drop(roles);

        for user in self.users.write().iter_mut() {
            for assigned in user.roles.iter_mut() {
                if assigned.eq_ignore_ascii_case(&previous) {
                    *assigned = name.to_string();
                }
            }
        }
        Ok(renamed)
    }

    async fn delete_role(&self, id: &str) -> Result<()> {
        let mut roles = self.roles.write();
        let index = roles
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| role_not_found(id))?;
        let removed = roles.remove(index);
        drop(roles);

        for user in self.users.write().iter_mut() {
            user.roles.retain(|r| !r.eq_ignore_ascii_case(&removed.name));
        }
        Ok(())
    }

    async fn update_role_permissions(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<Role> {
        let mut roles = self.roles.write();
        let role = roles
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| role_not_found(id))?;
        role.permissions.retain(|p| !contains_ignore_case(remove, p));
        for permission in add {
            if !contains_ignore_case(&role.permissions, permission) {
                role.permissions.push(permission.clone());
            }
        }
        Ok(role.clone())
    }

    async fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().clone())
    }

    async fn find_user(&self, id_or_name: &str) -> Result<Option<User>> {
        let users = self.users.read();
        let found = users
            .iter()
            .find(|u| u.id == id_or_name)
            .or_else(|| {
                users
                    .iter()
                    .find(|u| u.user_name.eq_ignore_ascii_case(id_or_name))
            });
        Ok(found.cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.policy.check(&user.password)?;
        let password_hash = self.hasher.hash(&user.password)?;

        let mut users = self.users.write();
        if users
            .iter()
            .any(|u| u.user_name.eq_ignore_ascii_case(&user.user_name))
        {
            return Err(ManagementError::conflict(format!(
                "User '{}' already exists.",
                user.user_name
            )));
        }
        let created = User {
            id: Uuid::new_v4().simple().to_string(),
            user_name: user.user_name,
            email: user.email,
            email_confirmed: user.email_confirmed,
            is_enabled: user.is_enabled,
            password_hash,
            roles: Vec::new(),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        let mut users = self.users.write();
        let index = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| user_not_found(id))?;
        users.remove(index);
        Ok(())
    }

    async fn set_email(&self, id: &str, email: &str) -> Result<()> {
        self.with_user(id, |user| {
            if !user.email.eq_ignore_ascii_case(email) {
                user.email_confirmed = false;
            }
            user.email = email.to_string();
        })
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.with_user(id, |user| user.is_enabled = enabled)
    }

    async fn reset_password(&self, id: &str, password: &str) -> Result<()> {
        self.policy.check(password)?;
        let hash = self.hasher.hash(password)?;
        self.with_user(id, |user| user.password_hash = hash)
    }

    async fn update_user_roles(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        self.with_user(id, |user| {
            user.roles.retain(|r| !contains_ignore_case(remove, r));
            for role in add {
                if !contains_ignore_case(&user.roles, role) {
                    user.roles.push(role.clone());
                }
            }
        })
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        self.policy.check(password)
    }
}
