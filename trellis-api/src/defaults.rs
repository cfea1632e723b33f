// Built-in feature table, permissions and recipes of the management host

use crate::guard::permissions;
use serde_json::json;
use std::sync::Arc;
use trellis_core::Result;
use trellis_features::{FeatureCatalog, FeatureDescriptor};
use trellis_identity::{Permission, PermissionProvider, StaticPermissionProvider};
use trellis_recipes::{RecipeDescriptor, RecipeStep};
use trellis_tenancy::DEFAULT_RECIPE_NAME;

pub const BUILTIN_RECIPES_PATH: &str = "Trellis.Recipes";

/// Features a fully set up management host runs with.
pub const REQUIRED_FEATURES: &[&str] = &[
    "Trellis.Settings",
    "Trellis.Features",
    "Trellis.Tenants",
    "Trellis.Roles",
    "Trellis.Users",
    "Trellis.Localization",
    "Trellis.Recipes",
    "Trellis.OpenId",
    "Trellis.OpenId.Server",
];

/// Features behind the headless surface.
pub const HEADLESS_FEATURES: &[&str] = &[
    "Trellis.Localization",
    "Trellis.OpenId",
    "Trellis.OpenId.Server",
];

pub fn feature_catalog() -> Result<FeatureCatalog> {
    FeatureCatalog::builder()
        .register(
            FeatureDescriptor::new("Trellis.Settings")
                .named("Settings")
                .in_category("Infrastructure")
                .described("Site settings and localization.")
                .always_enabled(),
        )
        .register(
            FeatureDescriptor::new("Trellis.Features")
                .named("Features")
                .in_category("Infrastructure")
                .described("Enable and disable features.")
                .always_enabled(),
        )
        .register(
            FeatureDescriptor::new("Trellis.Tenants")
                .named("Tenants")
                .in_category("Infrastructure")
                .described("Manage the tenants of this host.")
                .default_tenant_only(),
        )
        .register(
            FeatureDescriptor::new("Trellis.Roles")
                .named("Roles")
                .in_category("Security")
                .described("Role and permission management."),
        )
        .register(
            FeatureDescriptor::new("Trellis.Users")
                .named("Users")
                .in_category("Security")
                .described("User accounts.")
                .depends_on(["Trellis.Roles"]),
        )
        .register(
            FeatureDescriptor::new("Trellis.OpenId")
                .named("OpenId")
                .in_category("Security")
                .described("OpenId applications and scopes.")
                .depends_on(["Trellis.Users"]),
        )
        .register(
            FeatureDescriptor::new("Trellis.OpenId.Server")
                .named("OpenId Authorization Server")
                .in_category("Security")
                .described("Issues tokens to registered applications.")
                .depends_on(["Trellis.OpenId"]),
        )
        .register(
            FeatureDescriptor::new("Trellis.Localization")
                .named("Localization")
                .in_category("Internationalization")
                .described("Supported cultures of the site."),
        )
        .register(
            FeatureDescriptor::new("Trellis.Recipes")
                .named("Recipes")
                .in_category("Infrastructure")
                .described("Run recipes on demand."),
        )
        .register(
            FeatureDescriptor::new("Trellis.Themes.Admin")
                .named("Admin Theme")
                .in_category("Theme")
                .theme(),
        )
        .build()
}

struct Entry(&'static str, &'static str, &'static str);

const PERMISSIONS: &[Entry] = &[
    Entry(permissions::MANAGE_TENANTS, "Manage tenants", "Tenants"),
    Entry(permissions::MANAGE_FEATURES, "Manage features", "Features"),
    Entry(
        permissions::MANAGE_TENANT_FEATURE_PROFILES,
        "Manage tenant feature profiles",
        "Tenants",
    ),
    Entry(permissions::MANAGE_USERS, "Manage users", "Users"),
    Entry(permissions::MANAGE_ROLES, "Manage roles", "Roles"),
    Entry(permissions::MANAGE_APPLICATIONS, "Manage OpenId applications", "OpenId"),
    Entry(permissions::MANAGE_SCOPES, "Manage OpenId scopes", "OpenId"),
    Entry(permissions::MANAGE_RECIPES, "Manage recipes", "Recipes"),
    Entry(permissions::MANAGE_SETTINGS, "Manage settings", "Settings"),
];

pub fn permission_providers() -> Vec<Arc<dyn PermissionProvider>> {
    let permissions = PERMISSIONS
        .iter()
        .map(|Entry(name, description, category)| Permission::new(*name, *description, *category))
        .collect();
    vec![Arc::new(StaticPermissionProvider::new(permissions))]
}

/// The default setup recipe and a few runnable recipes.
pub fn recipes() -> Vec<RecipeDescriptor> {
    let all_permissions: Vec<&str> = PERMISSIONS.iter().map(|e| e.0).collect();

    vec![
        RecipeDescriptor::new(DEFAULT_RECIPE_NAME, BUILTIN_RECIPES_PATH, "saas-base.recipe.json")
            .with_display_name("SaaS Base")
            .setup()
            .with_step(RecipeStep::new(
                "feature",
                json!({ "enable": ["Trellis.Users", "Trellis.Recipes"] }),
            ))
            .with_step(RecipeStep::new(
                "roles",
                json!({ "roles": [
                    { "name": "Administrator", "permissions": all_permissions },
                    { "name": "Authenticated", "permissions": [] }
                ]}),
            ))
            .with_step(RecipeStep::new(
                "settings",
                json!({ "siteName": "[env:TenantName]" }),
            )),
        RecipeDescriptor::new("OpenId", BUILTIN_RECIPES_PATH, "openid.recipe.json")
            .with_display_name("OpenId Server")
            .with_step(RecipeStep::new(
                "feature",
                json!({ "enable": ["Trellis.OpenId.Server"] }),
            )),
        RecipeDescriptor::new("Localization", BUILTIN_RECIPES_PATH, "localization.recipe.json")
            .with_display_name("Localization")
            .with_step(RecipeStep::new(
                "feature",
                json!({ "enable": ["Trellis.Localization"] }),
            )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_identity::PermissionCatalog;

    #[test]
    fn test_catalog_builds() {
        let catalog = feature_catalog().unwrap();
        assert!(catalog.contains("Trellis.OpenId.Server"));
        assert!(catalog.always_enabled().contains("Trellis.Settings"));
        assert!(
            catalog
                .dependency_closure("Trellis.OpenId.Server")
                .contains("Trellis.Roles")
        );
    }

    #[test]
    fn test_every_route_permission_is_registered() {
        let catalog = PermissionCatalog::from_providers(&permission_providers());
        assert_eq!(catalog.list().len(), PERMISSIONS.len());
        assert_eq!(catalog.canonical("manageusers"), Some(permissions::MANAGE_USERS));
    }

    #[test]
    fn test_default_setup_recipe() {
        let recipes = recipes();
        let setup: Vec<_> = recipes.iter().filter(|r| r.is_setup_recipe).collect();
        assert_eq!(setup.len(), 1);
        assert_eq!(setup[0].name, DEFAULT_RECIPE_NAME);
        assert_eq!(setup[0].steps.len(), 3);
    }
}
