//! Users, roles and permissions of a tenant.

use super::{Removed, Scoped, TenantQuery};
use crate::error::{ApiResult, Payload};
use crate::pipeline::Caller;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, put},
};
use trellis_identity::{
    CreateRoleRequest, CreateUserRequest, PatchRoleRequest, PatchUserRequest, Permission,
    PermissionCatalog, RoleItem, RolePatchOutcome, RolePermissionsRequest, RoleService, UserItem,
    UserPatchOutcome, UserService,
};

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", patch(patch_user))
}

pub fn roles_router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", patch(patch_role))
        .route("/roles/:id/permissions", put(update_role_permissions))
        .route("/permissions", get(list_permissions))
}

pub async fn list_users(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<UserItem>>> {
    let users = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            ctx.resolve::<UserService>()?.list().await
        })
        .await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<CreateUserRequest>>,
) -> ApiResult<(StatusCode, Json<UserItem>)> {
    let target = request.target(&query);
    let user = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<UserService>()?.create(request.body).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn patch_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<PatchUserRequest>>,
) -> ApiResult<Response> {
    let target = request.target(&query);
    let outcome = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<UserService>()?.patch(&id, request.body).await
        })
        .await?;
    Ok(match outcome {
        UserPatchOutcome::Updated(user) => Json(user).into_response(),
        UserPatchOutcome::Removed(id) => Json(Removed::new(id)).into_response(),
    })
}

pub async fn list_roles(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<RoleItem>>> {
    let roles = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            ctx.resolve::<RoleService>()?.list().await
        })
        .await?;
    Ok(Json(roles))
}

pub async fn create_role(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<CreateRoleRequest>>,
) -> ApiResult<(StatusCode, Json<RoleItem>)> {
    let target = request.target(&query);
    let role = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<RoleService>()?.create(request.body).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn patch_role(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<PatchRoleRequest>>,
) -> ApiResult<Response> {
    let target = request.target(&query);
    let outcome = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<RoleService>()?.patch(&id, request.body).await
        })
        .await?;
    Ok(match outcome {
        RolePatchOutcome::Updated(role) => Json(role).into_response(),
        RolePatchOutcome::Removed(id) => Json(Removed::new(id)).into_response(),
    })
}

pub async fn update_role_permissions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<RolePermissionsRequest>>,
) -> ApiResult<Json<RoleItem>> {
    let target = request.target(&query);
    let role = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<RoleService>()?
                .update_permissions(&id, request.body)
                .await
        })
        .await?;
    Ok(Json(role))
}

pub async fn list_permissions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<Permission>>> {
    let permissions = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            Ok(ctx.resolve::<PermissionCatalog>()?.list().to_vec())
        })
        .await?;
    Ok(Json(permissions))
}
