//! Multi-tenant lifecycle and scoped execution for Trellis.
//!
//! - 🏢 **Registry**: single source of truth for tenant records, per-tenant locking
//! - 🔁 **Lifecycle**: `Uninitialized → Running ↔ Disabled → removed`
//! - 🧭 **Scoped execution**: run an operation inside the addressed tenant's context
//! - 🐚 **Shell host**: cached per-tenant contexts with lease counting
//! - 🔍 **Caller resolution**: by request url prefix and host
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_tenancy::*;
//!
//! let registry = Arc::new(TenantRegistry::new(Tenant::default_tenant("Default")));
//! let host = Arc::new(ShellHost::new(Arc::new(MyFactory)));
//! let manager = TenantManager::new(registry.clone(), host.clone());
//! let executor = ScopedExecutor::new(registry.clone(), host);
//!
//! manager.create(CreateTenantRequest::new("acme"))?;
//! manager.complete_setup("acme")?;
//!
//! let caller = registry.default_tenant()?;
//! let users = executor
//!     .execute(&caller, Some("acme"), |ctx| async move { list_users(&ctx).await })
//!     .await?;
//! ```

pub mod context;
pub mod host;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod store;
pub mod tenant;

pub use context::{ContextFactory, ContextProvider, TenantContext};
pub use host::ShellHost;
pub use lifecycle::{CreateTenantRequest, PatchOutcome, PatchTenantRequest, TenantManager};
pub use registry::TenantRegistry;
pub use resolver::{CallerResolver, ResolvedCaller, extract_host};
pub use scope::{ContextLease, ScopedExecutor};
pub use store::{JsonFileTenantStore, TenantStore};
pub use tenant::{
    DEFAULT_DATABASE_PROVIDER, DEFAULT_RECIPE_NAME, Tenant, TenantItem, TenantState, tenant_key,
};
