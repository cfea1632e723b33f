// Shared host state and bootstrap

use crate::defaults;
use crate::factory::DefaultContextFactory;
use crate::guard::ManagementGuard;
use crate::settings::HostSettings;
use std::sync::Arc;
use tracing::info;
use trellis_core::Result;
use trellis_features::{FeatureCatalog, FeatureProfileService, FeatureProfileStore};
use trellis_identity::PermissionProvider;
use trellis_recipes::RecipeDescriptor;
use trellis_tenancy::{
    CallerResolver, ContextProvider, JsonFileTenantStore, ScopedExecutor, ShellHost, Tenant,
    TenantManager, TenantRegistry,
};

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<HostSettings>,
    pub registry: Arc<TenantRegistry>,
    pub host: Arc<ShellHost>,
    pub factory: Arc<DefaultContextFactory>,
    pub manager: Arc<TenantManager>,
    pub executor: ScopedExecutor,
    pub resolver: Arc<CallerResolver>,
    pub guard: Arc<ManagementGuard>,
    pub profiles: Arc<FeatureProfileService>,
}

impl AppState {
    /// Host with the built-in features, permissions and recipes.
    pub fn bootstrap(settings: HostSettings) -> Result<Self> {
        HostBuilder::new(settings).build()
    }

    pub fn contexts(&self) -> Arc<dyn ContextProvider> {
        self.host.clone()
    }
}

pub struct HostBuilder {
    settings: HostSettings,
    catalog: Option<FeatureCatalog>,
    permissions: Vec<Arc<dyn PermissionProvider>>,
    recipes: Vec<RecipeDescriptor>,
    builtin: bool,
}

impl HostBuilder {
    pub fn new(settings: HostSettings) -> Self {
        Self {
            settings,
            catalog: None,
            permissions: Vec::new(),
            recipes: Vec::new(),
            builtin: true,
        }
    }

    /// Replace the built-in feature table.
    pub fn catalog(mut self, catalog: FeatureCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn permissions(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permissions.push(provider);
        self
    }

    pub fn recipe(mut self, recipe: RecipeDescriptor) -> Self {
        self.recipes.push(recipe);
        self
    }

    /// Leave out the built-in permissions and recipes.
    pub fn without_builtins(mut self) -> Self {
        self.builtin = false;
        self
    }

    pub fn build(self) -> Result<AppState> {
        let settings = Arc::new(self.settings.normalized());

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => defaults::feature_catalog()?,
        };
        let mut permissions = self.permissions;
        let mut recipes = self.recipes;
        if self.builtin {
            permissions.extend(defaults::permission_providers());
            recipes.extend(defaults::recipes());
        }

        let registry = Arc::new(match &settings.tenants_file {
            Some(path) => TenantRegistry::with_store(
                &settings.default_tenant,
                Arc::new(JsonFileTenantStore::new(path.clone())),
            )?,
            None => TenantRegistry::new(Tenant::default_tenant(settings.default_tenant.clone())),
        });

        let profile_store = Arc::new(FeatureProfileStore::new());
        let factory = Arc::new(
            DefaultContextFactory::new(Arc::new(catalog), profile_store.clone())
                .with_permissions(permissions)
                .with_recipes(recipes)
                .with_recipes_path(settings.recipes_path.clone()),
        );
        let host = Arc::new(ShellHost::new(factory.clone()));
        let contexts: Arc<dyn ContextProvider> = host.clone();

        let manager = Arc::new(
            TenantManager::new(registry.clone(), contexts.clone())
                .with_default_recipe(settings.default_recipe.clone()),
        );
        let executor = ScopedExecutor::new(registry.clone(), contexts.clone());
        let resolver = Arc::new(CallerResolver::new(registry.clone()));
        let guard = Arc::new(ManagementGuard::new(
            settings.api_keys.clone(),
            settings.allow_anonymous_management_api,
        ));
        let profiles = Arc::new(FeatureProfileService::new(
            profile_store,
            registry.clone(),
            contexts,
        ));

        info!(
            default_tenant = %settings.default_tenant,
            tenants = registry.len(),
            prefix = %settings.management_prefix,
            "Management host bootstrapped"
        );

        Ok(AppState {
            settings,
            registry,
            host,
            factory,
            manager,
            executor,
            resolver,
            guard,
            profiles,
        })
    }
}
