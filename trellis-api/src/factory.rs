// Default tenant context factory
//
// Per-tenant data (users, roles, OpenId records, settings and the enabled
// feature set) is kept here by tenant key and survives context rebuilds;
// it is dropped only when the tenant is removed.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use trellis_core::{Result, ServiceContainer};
use trellis_features::{
    FeatureCatalog, FeatureProfileStore, FeatureState, ProfilePolicy, TenantFeatures,
    feature_state,
};
use trellis_identity::{
    IdentityProvider, InMemoryIdentityProvider, PermissionCatalog, PermissionProvider,
    RoleService, UserService,
};
use trellis_openid::{ApplicationService, InMemoryOpenIdStore, OpenIdStore, ScopeService};
use trellis_recipes::{
    FeatureStep, FileRecipeHarvester, RecipeDescriptor, RecipeEnvironmentProvider,
    RecipeHarvester, RecipeService, RolesStep, SettingsStep, StaticEnvironmentProvider,
    StaticRecipeHarvester, StepRecipeExecutor,
};
use trellis_settings::{LocalizationService, SettingsStore, SiteSettingsService};
use trellis_tenancy::{ContextFactory, Tenant, tenant_key};

/// Everything a tenant owns.
#[derive(Clone)]
struct TenantData {
    identity: Arc<InMemoryIdentityProvider>,
    openid: Arc<InMemoryOpenIdStore>,
    settings: Arc<SettingsStore>,
    features: FeatureState,
}

pub struct DefaultContextFactory {
    catalog: Arc<FeatureCatalog>,
    profiles: Arc<FeatureProfileStore>,
    permissions: Vec<Arc<dyn PermissionProvider>>,
    recipes: Vec<RecipeDescriptor>,
    recipes_path: Option<PathBuf>,
    data: RwLock<HashMap<String, TenantData>>,
}

impl DefaultContextFactory {
    pub fn new(catalog: Arc<FeatureCatalog>, profiles: Arc<FeatureProfileStore>) -> Self {
        Self {
            catalog,
            profiles,
            permissions: Vec::new(),
            recipes: Vec::new(),
            recipes_path: None,
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_permissions(mut self, providers: Vec<Arc<dyn PermissionProvider>>) -> Self {
        self.permissions.extend(providers);
        self
    }

    pub fn with_recipes(mut self, recipes: Vec<RecipeDescriptor>) -> Self {
        self.recipes.extend(recipes);
        self
    }

    pub fn with_recipes_path(mut self, path: Option<PathBuf>) -> Self {
        self.recipes_path = path;
        self
    }

    /// Whether per-tenant data exists for `tenant_name`.
    pub fn has_data(&self, tenant_name: &str) -> bool {
        self.data.read().contains_key(&tenant_key(tenant_name))
    }

    fn tenant_data(&self, tenant: &Tenant) -> TenantData {
        if let Some(data) = self.data.read().get(&tenant.key()) {
            return data.clone();
        }

        self.data
            .write()
            .entry(tenant.key())
            .or_insert_with(|| {
                debug!(tenant = %tenant.name, "Created tenant data");
                TenantData {
                    identity: Arc::new(InMemoryIdentityProvider::new()),
                    openid: Arc::new(InMemoryOpenIdStore::new()),
                    settings: Arc::new(SettingsStore::for_tenant(&tenant.name)),
                    features: feature_state(&self.catalog),
                }
            })
            .clone()
    }

    fn harvesters(&self) -> Vec<Arc<dyn RecipeHarvester>> {
        let mut harvesters: Vec<Arc<dyn RecipeHarvester>> =
            vec![Arc::new(StaticRecipeHarvester::new(self.recipes.clone()))];
        if let Some(path) = &self.recipes_path {
            harvesters.push(Arc::new(FileRecipeHarvester::new(path.clone())));
        }
        harvesters
    }
}

#[async_trait]
impl ContextFactory for DefaultContextFactory {
    async fn build(&self, tenant: &Tenant, services: &ServiceContainer) -> Result<()> {
        let data = self.tenant_data(tenant);

        let assigned = self.profiles.resolve(&tenant.feature_profiles);
        let policy = ProfilePolicy::from_profiles(assigned.iter())?;
        let features = Arc::new(TenantFeatures::new(
            tenant.name.clone(),
            tenant.is_default,
            self.catalog.clone(),
            policy,
            data.features.clone(),
        ));
        services.register(features.clone());

        let permissions = Arc::new(PermissionCatalog::from_providers(&self.permissions));
        services.register(permissions.clone());

        let identity: Arc<dyn IdentityProvider> = data.identity.clone();
        services.register::<dyn IdentityProvider>(identity.clone());
        let roles = Arc::new(RoleService::new(identity.clone(), permissions));
        services.register(roles.clone());
        services.register(Arc::new(UserService::new(identity)));

        let openid: Arc<dyn OpenIdStore> = data.openid.clone();
        services.register(Arc::new(ApplicationService::new(openid.clone())));
        services.register(Arc::new(ScopeService::new(openid, &tenant.name)));

        let site = Arc::new(SiteSettingsService::new(data.settings.clone()));
        services.register(site.clone());
        services.register(Arc::new(LocalizationService::new(data.settings.clone())));

        let harvesters = self.harvesters();
        for harvester in &harvesters {
            services.add::<dyn RecipeHarvester>(harvester.clone());
        }
        let environment: Vec<Arc<dyn RecipeEnvironmentProvider>> = vec![Arc::new(
            StaticEnvironmentProvider::new(0)
                .with("TenantName", tenant.name.clone())
                .with("RequestUrlPrefix", tenant.request_url_prefix.clone())
                .with("RequestUrlHost", tenant.request_url_host.clone()),
        )];
        let executor = StepRecipeExecutor::new()
            .with_handler(Arc::new(FeatureStep::new(features)))
            .with_handler(Arc::new(RolesStep::new(roles)))
            .with_handler(Arc::new(SettingsStep::new(site)));
        services.register(Arc::new(RecipeService::new(
            tenant.name.clone(),
            harvesters,
            environment,
            Arc::new(executor),
        )));

        debug!(tenant = %tenant.name, services = services.len(), "Tenant services registered");
        Ok(())
    }

    fn discard(&self, tenant_name: &str) {
        if self.data.write().remove(&tenant_key(tenant_name)).is_some() {
            info!(tenant = %tenant_name, "Tenant data discarded");
        }
    }
}
