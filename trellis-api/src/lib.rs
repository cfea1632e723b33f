//! JSON management API for Trellis hosts.
//!
//! ## Features
//!
//! - 🌐 **Management surface**: tenants, features, profiles, users, roles, OpenId, recipes and settings
//! - 🛡️ **Boundary guard**: bearer API keys matched by SHA-256 digest, per-route permissions
//! - 🧭 **Tenant pipeline**: caller resolution by url prefix and host, admin path blocking
//! - 🏗️ **Bootstrap**: layered host settings, default tenant, per-tenant context factory
//! - 🛑 **Graceful shutdown** on Ctrl-C
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis_api::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HostError> {
//!     let settings = HostSettings::from_environment()?;
//!     let state = AppState::bootstrap(settings)?;
//!     serve(state, shutdown_signal()).await
//! }
//! ```

pub mod defaults;
pub mod error;
pub mod factory;
pub mod guard;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;

pub use error::{ApiError, ApiResult, HostError, Payload};
pub use factory::DefaultContextFactory;
pub use guard::{ManagementGuard, Principal, permissions, token_digest};
pub use server::{serve, shutdown_signal};
pub use settings::{ApiKeySettings, HostSettings};
pub use state::{AppState, HostBuilder};

use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

/// The full application: tenant pipeline in front of every route.
///
/// The pipeline may rewrite the request path, so it wraps the routes as a
/// fallback service and runs before routing.
pub fn build_router(state: AppState) -> Router {
    let routes = routes::router(state.clone());
    Router::new()
        .fallback_service(routes)
        .layer(middleware::from_fn_with_state(state, pipeline::tenant_pipeline))
        .layer(TraceLayer::new_for_http())
}
