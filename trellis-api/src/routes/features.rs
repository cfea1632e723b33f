//! Feature toggle and feature profile endpoints.

use super::{Removed, TenantQuery};
use crate::error::{ApiResult, Payload};
use crate::pipeline::Caller;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use trellis_features::{
    FeatureProfileItem, FeaturePayload, FeatureToggleRequest, FeatureToggleResult,
    ProfileUpsertOutcome, TenantFeatures, UpsertFeatureProfileRequest, feature_payload,
    toggle_features,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/features", get(list_features).put(toggle))
}

pub fn profiles_router() -> Router<AppState> {
    Router::new().route("/feature-profiles", get(list_profiles).put(upsert_profile))
}

pub async fn list_features(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<FeaturePayload>> {
    let payload = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            Ok(feature_payload(&*ctx.resolve::<TenantFeatures>()?).await)
        })
        .await?;
    Ok(Json(payload))
}

pub async fn toggle(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Payload(request): Payload<FeatureToggleRequest>,
) -> ApiResult<Json<FeatureToggleResult>> {
    let target = request.tenant.clone();
    let result = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            let features = ctx.resolve::<TenantFeatures>()?;
            toggle_features(&features, &request).await
        })
        .await?;
    Ok(Json(result))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<FeatureProfileItem>>> {
    state.manager.require_default_caller(&caller)?;
    Ok(Json(state.profiles.list()))
}

pub async fn upsert_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Payload(request): Payload<UpsertFeatureProfileRequest>,
) -> ApiResult<Response> {
    state.manager.require_default_caller(&caller)?;
    Ok(match state.profiles.upsert(request)? {
        ProfileUpsertOutcome::Saved(item) => Json(item).into_response(),
        ProfileUpsertOutcome::Removed(id) => Json(Removed::new(id)).into_response(),
    })
}
