//! `ShellHost`: caches one context per tenant and counts leases.

use crate::context::{ContextFactory, ContextProvider, TenantContext};
use crate::tenant::{Tenant, tenant_key};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use trellis_core::{Result, ServiceContainer};

struct Shell {
    context: Arc<TenantContext>,
    leases: usize,
}

pub struct ShellHost {
    factory: Arc<dyn ContextFactory>,
    shells: Mutex<HashMap<String, Shell>>,
    build_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ShellHost {
    pub fn new(factory: Arc<dyn ContextFactory>) -> Self {
        Self {
            factory,
            shells: Mutex::new(HashMap::new()),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lease_cached(&self, key: &str) -> Option<Arc<TenantContext>> {
        let mut shells = self.shells.lock();
        shells.get_mut(key).map(|shell| {
            shell.leases += 1;
            shell.context.clone()
        })
    }

    fn build_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.build_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    pub fn is_cached(&self, tenant_name: &str) -> bool {
        self.shells.lock().contains_key(&tenant_key(tenant_name))
    }

    /// Outstanding leases on the cached context of a tenant.
    pub fn active_leases(&self, tenant_name: &str) -> usize {
        self.shells
            .lock()
            .get(&tenant_key(tenant_name))
            .map(|shell| shell.leases)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ContextProvider for ShellHost {
    async fn acquire(&self, tenant: &Tenant) -> Result<Arc<TenantContext>> {
        let key = tenant.key();
        if let Some(context) = self.lease_cached(&key) {
            debug!(tenant = %tenant.name, "Reusing cached tenant context");
            return Ok(context);
        }

        // One build per tenant at a time; waiters pick up the cached result.
        let lock = self.build_lock(&key);
        let _building = lock.lock().await;
        if let Some(context) = self.lease_cached(&key) {
            return Ok(context);
        }

        let services = ServiceContainer::new();
        self.factory.build(tenant, &services).await?;
        let context = Arc::new(TenantContext::new(tenant.clone(), services));

        self.shells.lock().insert(
            key,
            Shell {
                context: context.clone(),
                leases: 1,
            },
        );
        debug!(tenant = %tenant.name, context = %context.id(), "Built tenant context");
        Ok(context)
    }

    fn release(&self, context: &TenantContext) {
        let mut shells = self.shells.lock();
        if let Some(shell) = shells.get_mut(&context.tenant().key()) {
            if std::ptr::eq(Arc::as_ptr(&shell.context), context) {
                shell.leases = shell.leases.saturating_sub(1);
            }
        }
        debug!(tenant = %context.tenant_name(), "Released tenant context");
    }

    fn evict(&self, tenant_name: &str) {
        if self.shells.lock().remove(&tenant_key(tenant_name)).is_some() {
            debug!(tenant = %tenant_name, "Evicted tenant context");
        }
    }

    fn discard(&self, tenant_name: &str) {
        self.evict(tenant_name);
        self.build_locks.lock().remove(&tenant_key(tenant_name));
        self.factory.discard(tenant_name);
    }
}
