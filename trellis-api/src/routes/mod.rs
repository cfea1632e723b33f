//! Management routes.

pub mod features;
pub mod health;
pub mod identity;
pub mod inspection;
pub mod openid;
pub mod recipes;
pub mod settings;
pub mod tenants;

use crate::guard::{PermissionGate, permissions, require_permission};
use crate::state::AppState;
use axum::{Router, middleware, routing::get};
use serde::{Deserialize, Serialize};

/// `?tenant=` selector of tenant-scoped reads.
#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub tenant: Option<String>,
}

/// A request body with an optional `tenant` selector next to its fields.
#[derive(Debug, Deserialize)]
pub struct Scoped<T> {
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Scoped<T> {
    /// Body `tenant` wins over the query string.
    pub fn target(&self, query: &TenantQuery) -> Option<String> {
        self.tenant.clone().or_else(|| query.tenant.clone())
    }
}

/// Body returned after a remove operation.
#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: String,
}

impl Removed {
    pub fn new(removed: impl Into<String>) -> Self {
        Self {
            removed: removed.into(),
        }
    }
}

fn gated(router: Router<AppState>, state: &AppState, permission: &'static str) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        PermissionGate::new(state.guard.clone(), permission),
        require_permission,
    ))
}

/// Routes below the management prefix, each behind its permission.
pub fn management_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(gated(tenants::router(), state, permissions::MANAGE_TENANTS))
        .merge(gated(features::router(), state, permissions::MANAGE_FEATURES))
        .merge(gated(
            features::profiles_router(),
            state,
            permissions::MANAGE_TENANT_FEATURE_PROFILES,
        ))
        .merge(gated(identity::users_router(), state, permissions::MANAGE_USERS))
        .merge(gated(identity::roles_router(), state, permissions::MANAGE_ROLES))
        .merge(gated(
            openid::applications_router(),
            state,
            permissions::MANAGE_APPLICATIONS,
        ))
        .merge(gated(openid::scopes_router(), state, permissions::MANAGE_SCOPES))
        .merge(gated(recipes::router(), state, permissions::MANAGE_RECIPES))
        .merge(gated(settings::router(), state, permissions::MANAGE_SETTINGS))
}

pub fn router(state: AppState) -> Router {
    let prefix = state.settings.management_prefix.clone();
    Router::new()
        .route("/health", get(health::health_check))
        .nest(inspection::INSPECTION_PREFIX, inspection::router())
        .nest(&prefix, management_routes(&state))
        .with_state(state)
}
