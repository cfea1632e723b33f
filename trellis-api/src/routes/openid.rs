//! OpenId applications and scopes.

use super::{Removed, Scoped, TenantQuery};
use crate::error::{ApiResult, Payload};
use crate::pipeline::Caller;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use trellis_openid::{
    ApplicationItem, ApplicationPatchOutcome, ApplicationService, CreateApplicationRequest,
    CreateScopeRequest, PatchApplicationRequest, PatchScopeRequest, ScopeItem, ScopePatchOutcome,
    ScopeService,
};

pub fn applications_router() -> Router<AppState> {
    Router::new()
        .route(
            "/openid/applications",
            get(list_applications).post(create_application),
        )
        .route("/openid/applications/:id", patch(patch_application))
}

pub fn scopes_router() -> Router<AppState> {
    Router::new()
        .route("/openid/scopes", get(list_scopes).post(create_scope))
        .route("/openid/scopes/:id", patch(patch_scope))
}

pub async fn list_applications(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<ApplicationItem>>> {
    let applications = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            ctx.resolve::<ApplicationService>()?.list().await
        })
        .await?;
    Ok(Json(applications))
}

pub async fn create_application(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<CreateApplicationRequest>>,
) -> ApiResult<(StatusCode, Json<ApplicationItem>)> {
    let target = request.target(&query);
    let application = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<ApplicationService>()?.create(request.body).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn patch_application(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<PatchApplicationRequest>>,
) -> ApiResult<Response> {
    let target = request.target(&query);
    let outcome = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<ApplicationService>()?
                .patch(&id, request.body)
                .await
        })
        .await?;
    Ok(match outcome {
        ApplicationPatchOutcome::Updated(application) => Json(application).into_response(),
        ApplicationPatchOutcome::Removed(id) => Json(Removed::new(id)).into_response(),
    })
}

pub async fn list_scopes(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<ScopeItem>>> {
    let scopes = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            ctx.resolve::<ScopeService>()?.list().await
        })
        .await?;
    Ok(Json(scopes))
}

pub async fn create_scope(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<CreateScopeRequest>>,
) -> ApiResult<(StatusCode, Json<ScopeItem>)> {
    let target = request.target(&query);
    let scope = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<ScopeService>()?.create(request.body).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(scope)))
}

pub async fn patch_scope(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<PatchScopeRequest>>,
) -> ApiResult<Response> {
    let target = request.target(&query);
    let outcome = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<ScopeService>()?.patch(&id, request.body).await
        })
        .await?;
    Ok(match outcome {
        ScopePatchOutcome::Updated(scope) => Json(scope).into_response(),
        ScopePatchOutcome::Removed(id) => Json(Removed::new(id)).into_response(),
    })
}
