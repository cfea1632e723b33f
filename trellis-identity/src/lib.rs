//! Per-tenant identity management for Trellis.
//!
//! Users, roles and the permission catalog of one tenant, always reached
//! through that tenant's context.
//!
//! ## Features
//!
//! - 🔑 **Argon2 Hashing** - Passwords hashed with a per-user salt
//! - 📏 **Password Policy** - Minimum length and digit checks before any change
//! - 👥 **Roles** - Case-insensitive unique names, permission sets reconciled by difference
//! - 🙋 **Users** - Role references validated up front, rollback on failed assignment
//! - 📋 **Permissions** - Read-only catalog merged from feature providers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_identity::*;
//!
//! let identity = Arc::new(InMemoryIdentityProvider::new());
//! let users = UserService::new(identity.clone());
//!
//! let alice = users
//!     .create(CreateUserRequest::new("alice", "alice@example.com", "pass123"))
//!     .await?;
//! ```

pub mod password;
pub mod permission;
pub mod provider;
pub mod roles;
pub mod users;

pub use password::{PasswordHasher, PasswordPolicy};
pub use permission::{Permission, PermissionCatalog, PermissionProvider, StaticPermissionProvider};
pub use provider::{IdentityProvider, InMemoryIdentityProvider, NewUser, Role, User};
pub use roles::{
    CreateRoleRequest, PatchRoleRequest, RoleItem, RolePatchOutcome, RolePermissionsRequest,
    RoleService,
};
pub use users::{CreateUserRequest, PatchUserRequest, UserItem, UserPatchOutcome, UserService};
