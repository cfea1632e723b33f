//! Scoped execution: run an operation inside the addressed tenant's context.
//!
//! The target is resolved against the registry, must be `Running` unless it
//! is the caller itself, and its context is held by a [`ContextLease`] that
//! releases on drop. Release therefore happens on success, on error, on
//! panic and when the surrounding future is cancelled.

use crate::context::{ContextProvider, TenantContext};
use crate::registry::{TenantRegistry, not_found};
use crate::tenant::Tenant;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;
use trellis_core::{ManagementError, Result};

/// A leased tenant context, released when dropped.
pub struct ContextLease {
    provider: Arc<dyn ContextProvider>,
    context: Arc<TenantContext>,
}

impl ContextLease {
    pub fn context(&self) -> Arc<TenantContext> {
        self.context.clone()
    }
}

impl Deref for ContextLease {
    type Target = TenantContext;

    fn deref(&self) -> &TenantContext {
        &self.context
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.provider.release(&self.context);
    }
}

#[derive(Clone)]
pub struct ScopedExecutor {
    registry: Arc<TenantRegistry>,
    provider: Arc<dyn ContextProvider>,
}

impl ScopedExecutor {
    pub fn new(registry: Arc<TenantRegistry>, provider: Arc<dyn ContextProvider>) -> Self {
        Self { registry, provider }
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn ContextProvider> {
        &self.provider
    }

    /// Decide which tenant an operation addressed by `caller` runs against.
    ///
    /// No target, a blank target, or the caller's own name selects the
    /// caller. Only the default tenant may address other tenants, and those
    /// must exist and be `Running`.
    pub fn resolve_target(&self, caller: &Tenant, target: Option<&str>) -> Result<Tenant> {
        let target = match target.map(str::trim) {
            None | Some("") => return Ok(caller.clone()),
            Some(name) if caller.is_named(name) => return Ok(caller.clone()),
            Some(name) => name,
        };

        if !caller.is_default {
            return Err(ManagementError::forbidden(format!(
                "Tenant '{}' cannot manage tenant '{}'.",
                caller.name, target
            )));
        }

        let tenant = self.registry.get(target).ok_or_else(|| not_found(target))?;
        if !tenant.state.is_running() {
            return Err(ManagementError::invalid(format!(
                "Tenant '{}' is not running.",
                tenant.name
            ))
            .with_detail("state", tenant.state.to_string()));
        }
        Ok(tenant)
    }

    /// Lease a context for `tenant` without any state check.
    pub async fn acquire(&self, tenant: &Tenant) -> Result<ContextLease> {
        let context = self.provider.acquire(tenant).await?;
        debug!(tenant = %tenant.name, "Acquired tenant context");
        Ok(ContextLease {
            provider: self.provider.clone(),
            context,
        })
    }

    /// Run `operation` inside the context of the resolved target tenant.
    pub async fn execute<F, Fut, T>(
        &self,
        caller: &Tenant,
        target: Option<&str>,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<TenantContext>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let tenant = self.resolve_target(caller, target)?;
        let lease = self.acquire(&tenant).await?;
        let result = operation(lease.context()).await;
        drop(lease);
        result
    }
}
