//! Site and localization settings.

use super::{Scoped, TenantQuery};
use crate::error::{ApiResult, Payload};
use crate::pipeline::Caller;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use trellis_settings::{
    LocalizationPatch, LocalizationService, LocalizationSettings, SiteSettings, SiteSettingsPatch,
    SiteSettingsService,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/site-settings", get(get_site).put(update_site))
        .route("/localization", get(get_localization).put(update_localization))
}

pub async fn get_site(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<SiteSettings>> {
    let site = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            Ok(ctx.resolve::<SiteSettingsService>()?.get())
        })
        .await?;
    Ok(Json(site))
}

pub async fn update_site(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<SiteSettingsPatch>>,
) -> ApiResult<Json<SiteSettings>> {
    let target = request.target(&query);
    let site = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<SiteSettingsService>()?.update(&request.body)
        })
        .await?;
    Ok(Json(site))
}

pub async fn get_localization(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<LocalizationSettings>> {
    let localization = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            Ok(ctx.resolve::<LocalizationService>()?.get())
        })
        .await?;
    Ok(Json(localization))
}

pub async fn update_localization(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
    Payload(request): Payload<Scoped<LocalizationPatch>>,
) -> ApiResult<Json<LocalizationSettings>> {
    let target = request.target(&query);
    let localization = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<LocalizationService>()?.update(&request.body)
        })
        .await?;
    Ok(Json(localization))
}
