//! Tenant lifecycle endpoints, default tenant only.

use super::Removed;
use crate::error::{ApiResult, Payload};
use crate::pipeline::Caller;
use crate::state::AppState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trellis_core::ManagementError;
use trellis_core::names::non_blank;
use trellis_recipes::{RecipeService, find_setup_recipe};
use trellis_tenancy::{
    ContextProvider, CreateTenantRequest, PatchOutcome, PatchTenantRequest, TenantItem,
    TenantState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/:name", patch(patch_tenant))
        .route("/tenants/:name/setup", post(setup_tenant))
}

pub async fn list_tenants(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<TenantItem>>> {
    state.manager.require_default_caller(&caller)?;
    Ok(Json(state.manager.list().iter().map(|t| t.to_item()).collect()))
}

pub async fn create_tenant(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Payload(request): Payload<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantItem>)> {
    state.manager.require_default_caller(&caller)?;
    let tenant = state.manager.create(request)?;
    Ok((StatusCode::CREATED, Json(tenant.to_item())))
}

pub async fn patch_tenant(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(name): Path<String>,
    Payload(request): Payload<PatchTenantRequest>,
) -> ApiResult<Response> {
    state.manager.require_default_caller(&caller)?;
    Ok(match state.manager.patch(&name, request)? {
        PatchOutcome::Updated(tenant) => Json(tenant.to_item()).into_response(),
        PatchOutcome::Removed(name) => Json(Removed::new(name)).into_response(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupTenantRequest {
    pub recipe_name: Option<String>,
}

/// Run the tenant's setup recipe in a fresh context and mark it `Running`.
///
/// A failed recipe leaves the tenant `Uninitialized` and drops the context
/// built for it.
pub async fn setup_tenant(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Json<TenantItem>> {
    state.manager.require_default_caller(&caller)?;

    let request: SetupTenantRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SetupTenantRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ManagementError::invalid("Invalid request body.").with_detail("errors", vec![e.to_string()])
        })?
    };

    let tenant = state.registry.get(&name).ok_or_else(|| {
        ManagementError::not_found(format!("Tenant '{}' was not found.", name.trim()))
    })?;
    if tenant.state != TenantState::Uninitialized {
        return Err(ManagementError::invalid(format!(
            "Tenant '{}' is already set up.",
            tenant.name
        ))
        .with_detail("state", tenant.state.to_string())
        .into());
    }

    let recipe_name = non_blank(request.recipe_name.as_deref())
        .unwrap_or_else(|| tenant.recipe_name.clone());

    // cancelled when the request future is dropped
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let outcome = async {
        let lease = state.executor.acquire(&tenant).await?;
        let recipes = lease.resolve::<RecipeService>()?;
        let recipe = find_setup_recipe(recipes.harvesters(), &recipe_name).await?;
        recipes.run(&recipe, None, &cancel).await
    }
    .await;

    match outcome {
        Ok(result) => {
            let tenant = state.manager.complete_setup(&tenant.name)?;
            info!(
                tenant = %tenant.name,
                recipe = %recipe_name,
                execution = %result.execution_id,
                "Tenant set up"
            );
            Ok(Json(tenant.to_item()))
        }
        Err(err) => {
            state.contexts().evict(&tenant.name);
            warn!(tenant = %tenant.name, recipe = %recipe_name, error = %err, "Tenant setup failed");
            Err(err.into())
        }
    }
}
