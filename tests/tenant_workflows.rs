//! Integration tests for common Trellis workflows.
//!
//! These tests drive the library crates directly, without the HTTP surface.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use trellis::prelude::*;
use trellis::settings::SiteSettingsPatch;
use trellis::tenancy::{CreateTenantRequest, PatchOutcome, PatchTenantRequest, tenant_key};

// =============================================================================
// Fixtures
// =============================================================================

/// Builds contexts holding a per-tenant settings store and feature view.
struct SiteFactory {
    catalog: Arc<FeatureCatalog>,
    stores: Mutex<HashMap<String, Arc<SettingsStore>>>,
    features: Mutex<HashMap<String, trellis::features::FeatureState>>,
    builds: AtomicUsize,
}

impl SiteFactory {
    fn new() -> Self {
        let catalog = FeatureCatalog::builder()
            .register(FeatureDescriptor::new("Site").always_enabled())
            .register(FeatureDescriptor::new("Blog"))
            .register(FeatureDescriptor::new("Comments").depends_on(["Blog"]))
            .build()
            .unwrap();
        Self {
            catalog: Arc::new(catalog),
            stores: Mutex::new(HashMap::new()),
            features: Mutex::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn has_data(&self, tenant: &str) -> bool {
        self.stores.lock().contains_key(&tenant_key(tenant))
    }
}

#[async_trait]
impl ContextFactory for SiteFactory {
    async fn build(&self, tenant: &Tenant, services: &ServiceContainer) -> Result<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let store = self
            .stores
            .lock()
            .entry(tenant.key())
            .or_insert_with(|| Arc::new(SettingsStore::for_tenant(&tenant.name)))
            .clone();
        let state = self
            .features
            .lock()
            .entry(tenant.key())
            .or_insert_with(|| trellis::features::feature_state(&self.catalog))
            .clone();

        services.register(Arc::new(SiteSettingsService::new(store)));
        services.register(Arc::new(TenantFeatures::new(
            tenant.name.clone(),
            tenant.is_default,
            self.catalog.clone(),
            Default::default(),
            state,
        )));
        Ok(())
    }

    fn discard(&self, tenant_name: &str) {
        self.stores.lock().remove(&tenant_key(tenant_name));
        self.features.lock().remove(&tenant_key(tenant_name));
    }
}

struct Host {
    factory: Arc<SiteFactory>,
    shells: Arc<ShellHost>,
    manager: TenantManager,
    executor: ScopedExecutor,
    resolver: CallerResolver,
}

impl Host {
    fn new() -> Self {
        let registry = Arc::new(TenantRegistry::new(Tenant::default_tenant("Default")));
        let factory = Arc::new(SiteFactory::new());
        let shells = Arc::new(ShellHost::new(factory.clone()));
        let contexts: Arc<dyn ContextProvider> = shells.clone();
        Self {
            manager: TenantManager::new(registry.clone(), contexts.clone()),
            executor: ScopedExecutor::new(registry.clone(), contexts),
            resolver: CallerResolver::new(registry),
            factory,
            shells,
        }
    }

    fn default_caller(&self) -> Tenant {
        self.manager.registry().default_tenant().unwrap()
    }

    fn running(&self, name: &str, prefix: &str) -> Tenant {
        self.manager
            .create(CreateTenantRequest::new(name).with_request_url_prefix(prefix))
            .unwrap();
        self.manager.complete_setup(name).unwrap()
    }

    async fn site_name(&self, caller: &Tenant, target: Option<&str>) -> Result<String> {
        self.executor
            .execute(caller, target, |ctx| async move {
                Ok(ctx.resolve::<SiteSettingsService>()?.get().site_name)
            })
            .await
    }

    async fn rename(&self, caller: &Tenant, target: Option<&str>, name: &str) -> Result<()> {
        let patch = SiteSettingsPatch {
            site_name: Some(name.into()),
            ..Default::default()
        };
        self.executor
            .execute(caller, target, move |ctx| async move {
                ctx.resolve::<SiteSettingsService>()?.update(&patch)?;
                Ok(())
            })
            .await
    }
}

// =============================================================================
// Scoped Execution Tests
// =============================================================================

#[tokio::test]
async fn test_tenant_data_is_isolated() {
    let host = Host::new();
    let caller = host.default_caller();
    host.running("acme", "acme");
    host.running("globex", "globex");

    host.rename(&caller, Some("acme"), "Acme Corp").await.unwrap();
    host.rename(&caller, None, "Headquarters").await.unwrap();

    assert_eq!(host.site_name(&caller, Some("acme")).await.unwrap(), "Acme Corp");
    assert_eq!(host.site_name(&caller, None).await.unwrap(), "Headquarters");
    assert_ne!(host.site_name(&caller, Some("globex")).await.unwrap(), "Acme Corp");
}

#[tokio::test]
async fn test_leases_are_released_after_each_operation() {
    let host = Host::new();
    let caller = host.default_caller();
    host.running("acme", "acme");

    host.site_name(&caller, Some("acme")).await.unwrap();
    assert!(host.shells.is_cached("acme"));
    assert_eq!(host.shells.active_leases("acme"), 0);

    // failed operations release too
    let err = host
        .executor
        .execute(&caller, Some("acme"), |_ctx| async move {
            Err::<(), _>(ManagementError::invalid("rejected"))
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(host.shells.active_leases("acme"), 0);
}

#[tokio::test]
async fn test_contexts_are_reused_until_evicted() {
    let host = Host::new();
    let caller = host.default_caller();
    host.running("acme", "acme");

    host.site_name(&caller, Some("acme")).await.unwrap();
    host.site_name(&caller, Some("acme")).await.unwrap();
    assert_eq!(host.factory.builds(), 1);

    host.shells.evict("acme");
    host.rename(&caller, Some("acme"), "Rebuilt").await.unwrap();
    assert_eq!(host.factory.builds(), 2);
    // per-tenant data outlives the context
    assert_eq!(host.site_name(&caller, Some("acme")).await.unwrap(), "Rebuilt");
}

#[tokio::test]
async fn test_only_default_caller_crosses_tenants() {
    let host = Host::new();
    let acme = host.running("acme", "acme");
    host.running("globex", "globex");

    let err = host.site_name(&acme, Some("globex")).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    // naming itself is allowed
    assert!(host.site_name(&acme, Some("ACME")).await.is_ok());
}

#[tokio::test]
async fn test_target_must_be_running() {
    let host = Host::new();
    let caller = host.default_caller();
    host.manager.create(CreateTenantRequest::new("pending")).unwrap();

    let err = host.site_name(&caller, Some("pending")).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(host.factory.builds(), 0);

    let err = host.site_name(&caller, Some("ghost")).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_disable_evicts_and_remove_discards() {
    let host = Host::new();
    let caller = host.default_caller();
    host.running("acme", "acme");
    host.rename(&caller, Some("acme"), "Acme").await.unwrap();
    assert!(host.shells.is_cached("acme"));

    let outcome = host.manager.patch("acme", PatchTenantRequest::disable()).unwrap();
    assert!(matches!(outcome, PatchOutcome::Updated(ref t) if t.state == TenantState::Disabled));
    assert!(!host.shells.is_cached("acme"));
    assert!(host.factory.has_data("acme"));

    let outcome = host.manager.patch("ACME", PatchTenantRequest::remove()).unwrap();
    assert_eq!(outcome, PatchOutcome::Removed("acme".into()));
    assert!(!host.factory.has_data("acme"));
    assert!(host.manager.registry().get("acme").is_none());
}

#[tokio::test]
async fn test_reenabled_tenant_keeps_its_data() {
    let host = Host::new();
    let caller = host.default_caller();
    host.running("acme", "acme");
    host.rename(&caller, Some("acme"), "Acme").await.unwrap();

    host.manager.patch("acme", PatchTenantRequest::disable()).unwrap();
    host.manager.patch("acme", PatchTenantRequest::enable()).unwrap();

    assert_eq!(host.site_name(&caller, Some("acme")).await.unwrap(), "Acme");
}

#[tokio::test]
async fn test_url_bindings_are_unique() {
    let host = Host::new();
    host.running("acme", "acme");

    let err = host
        .manager
        .create(CreateTenantRequest::new("copycat").with_request_url_prefix("/ACME/"))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    // tenants without a binding never collide
    for name in ["plain-a", "plain-b"] {
        host.manager.create(CreateTenantRequest::new(name)).unwrap();
    }
}

// =============================================================================
// Caller Resolution Tests
// =============================================================================

#[tokio::test]
async fn test_caller_resolution() {
    let host = Host::new();
    host.running("acme", "acme");

    let resolved = host.resolver.resolve(None, "/acme/api/management/users").unwrap();
    assert_eq!(resolved.tenant.name, "acme");
    assert_eq!(resolved.prefix.as_deref(), Some("acme"));

    let resolved = host.resolver.resolve(Some("example.test:8080"), "/api/management/users").unwrap();
    assert!(resolved.tenant.is_default);
    assert!(resolved.prefix.is_none());

    host.manager.patch("acme", PatchTenantRequest::disable()).unwrap();
    let err = host.resolver.resolve(None, "/acme/api/management/users").unwrap_err();
    assert_eq!(err.status_code(), 404);
}

// =============================================================================
// Feature Tests
// =============================================================================

#[tokio::test]
async fn test_feature_state_survives_rebuilds() {
    let host = Host::new();
    let caller = host.default_caller();
    host.running("acme", "acme");

    let result = host
        .executor
        .execute(&caller, Some("acme"), |ctx| async move {
            let features = ctx.resolve::<TenantFeatures>()?;
            toggle_features(&features, &FeatureToggleRequest::enable(["Comments"])).await
        })
        .await
        .unwrap();
    assert_eq!(result.changed.enabled, vec!["Blog", "Comments"]);

    host.shells.evict("acme");
    let payload = host
        .executor
        .execute(&caller, Some("acme"), |ctx| async move {
            Ok(feature_payload(&*ctx.resolve::<TenantFeatures>()?).await)
        })
        .await
        .unwrap();
    assert!(payload.feature("Comments").unwrap().enabled);
    assert!(payload.feature("Site").unwrap().is_always_enabled);
}
