//! OpenId client and scope management for Trellis tenants.
//!
//! Manages the records an OpenId server reads; token issuance lives
//! elsewhere.
//!
//! ## Features
//!
//! - 🪪 **Applications** - Confidential and public clients with secret rules checked on every change
//! - 🔒 **Hashed Secrets** - Client secrets stored as SHA-256, never returned
//! - 🔗 **Absolute URIs** - Redirect and post-logout URIs validated with `url`
//! - 🎯 **Scopes** - Resource sets that never include the tenant's reserved value
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_openid::*;
//!
//! let store = Arc::new(InMemoryOpenIdStore::new());
//! let scopes = ScopeService::new(store.clone(), "Acme");
//!
//! scopes
//!     .create(CreateScopeRequest {
//!         name: "api".into(),
//!         display_name: "API".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod application;
pub mod scope;
pub mod store;

pub use application::{
    ApplicationItem, ApplicationPatchOutcome, ApplicationService, CreateApplicationRequest,
    PatchApplicationRequest, SCOPE_PERMISSION_PREFIX, hash_secret,
};
pub use scope::{
    CreateScopeRequest, PatchScopeRequest, ScopeItem, ScopePatchOutcome, ScopeService,
    TENANT_RESOURCE_PREFIX, reserved_resource,
};
pub use store::{
    ClientType, ConsentType, InMemoryOpenIdStore, OpenIdApplication, OpenIdScope, OpenIdStore,
};
