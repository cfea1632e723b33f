// Trellis - multi-tenant management core
//
// This library bundles tenant lifecycle, tenant-scoped execution, features,
// identity, OpenId and recipes, served by an optional JSON management API.

// Re-export core functionality
pub use trellis_core::*;

pub use trellis_config as config;
pub use trellis_features as features;
pub use trellis_identity as identity;
pub use trellis_log as log;
pub use trellis_openid as openid;
pub use trellis_recipes as recipes;
pub use trellis_settings as settings;
pub use trellis_tenancy as tenancy;

#[cfg(feature = "api")]
pub use trellis_api as api;

// Prelude for common imports
pub mod prelude {
    pub use crate::{ManagementError, Result, ServiceContainer};

    pub use trellis_config::{ConfigManager, Validate};
    pub use trellis_features::{
        FeatureCatalog, FeatureDescriptor, FeatureProfileStore, FeatureToggleRequest,
        TenantFeatures, feature_payload, toggle_features,
    };
    pub use trellis_identity::{
        InMemoryIdentityProvider, Permission, PermissionCatalog, RoleService, UserService,
    };
    pub use trellis_log::LogConfig;
    pub use trellis_openid::{ApplicationService, InMemoryOpenIdStore, ScopeService};
    pub use trellis_recipes::{RecipeDescriptor, RecipeService, RecipeStep};
    pub use trellis_settings::{LocalizationService, SettingsStore, SiteSettingsService};
    pub use trellis_tenancy::{
        CallerResolver, ContextFactory, ContextProvider, ScopedExecutor, ShellHost, Tenant,
        TenantContext, TenantManager, TenantRegistry, TenantState,
    };

    #[cfg(feature = "api")]
    pub use trellis_api::{AppState, HostBuilder, HostSettings, build_router, serve};
}
