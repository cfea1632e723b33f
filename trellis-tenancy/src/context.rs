//! Isolated tenant contexts and the provider contract that hands them out.

use crate::tenant::Tenant;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use trellis_core::{Result, ServiceContainer};
use uuid::Uuid;

/// The per-tenant resolution scope an operation runs against.
#[derive(Debug)]
pub struct TenantContext {
    id: Uuid,
    tenant: Tenant,
    services: ServiceContainer,
    created_at: DateTime<Utc>,
}

impl TenantContext {
    pub fn new(tenant: Tenant, services: ServiceContainer) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant,
            services,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the tenant record the context was built from.
    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant.name
    }

    pub fn is_default(&self) -> bool {
        self.tenant.is_default
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolve<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.resolve::<T>()
    }

    pub fn resolve_all<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.resolve_all::<T>()
    }
}

/// Hands out tenant contexts. Construction and caching policy belong to the
/// implementation; callers only acquire and release.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn acquire(&self, tenant: &Tenant) -> Result<Arc<TenantContext>>;

    fn release(&self, context: &TenantContext);

    /// Drop any cached context so the next acquire rebuilds it.
    fn evict(&self, tenant_name: &str);

    /// Forget the tenant entirely, including its per-tenant data.
    fn discard(&self, tenant_name: &str) {
        self.evict(tenant_name);
    }
}

/// Populates a fresh context's services for one tenant.
#[async_trait]
pub trait ContextFactory: Send + Sync {
    async fn build(&self, tenant: &Tenant, services: &ServiceContainer) -> Result<()>;

    /// Called when a tenant is removed.
    fn discard(&self, _tenant_name: &str) {}
}
