//! Read-only host inspection: summary, feature status, links and capabilities.
//!
//! Everything is read from the registry and the default tenant's context.
//! A default tenant that is not running reports `ready: false` with every
//! feature off.

use crate::defaults::{HEADLESS_FEATURES, REQUIRED_FEATURES};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use trellis_core::Result;
use trellis_features::TenantFeatures;
use trellis_openid::{ApplicationService, ScopeService};
use trellis_settings::SiteSettingsService;

pub const INSPECTION_PREFIX: &str = "/api/saas";

/// Management routes listed as capabilities, relative to the prefix.
const ADAPTERS: &[&str] = &[
    "/tenants",
    "/features",
    "/feature-profiles",
    "/users",
    "/roles",
    "/permissions",
    "/roles/:id/permissions",
    "/site-settings",
    "/localization",
    "/openid/applications",
    "/openid/scopes",
    "/recipes",
    "/recipes/execute",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/features", get(features))
        .route("/links", get(links))
        .route("/capabilities", get(capabilities))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStatus {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteState {
    pub site_name: String,
    pub time_zone_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OpenIdState {
    pub applications: usize,
    pub scopes: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSummary {
    pub ready: bool,
    pub last_updated_utc: DateTime<Utc>,
    pub message: String,
    pub tenant_count: usize,
    pub default_tenant_state: String,
    pub site: SiteState,
    pub open_id: OpenIdState,
    pub required_features: Vec<FeatureStatus>,
    pub other_features: Vec<FeatureStatus>,
    #[serde(skip)]
    enabled: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureReport {
    pub ready: bool,
    pub last_updated_utc: DateTime<Utc>,
    pub required_features: Vec<FeatureStatus>,
    pub other_features: Vec<FeatureStatus>,
}

#[derive(Debug, Serialize)]
pub struct InspectionLink {
    pub name: &'static str,
    pub url: String,
    pub description: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub ready: bool,
    pub last_updated_utc: DateTime<Utc>,
    pub mode: &'static str,
    pub fallback_admin_ui: String,
    pub admin_path_access_disabled: bool,
    pub available_adapters: Vec<String>,
    pub allow_anonymous_management_api: bool,
    pub headless_features: Vec<FeatureStatus>,
    pub missing_headless_features: Vec<String>,
}

fn statuses(names: &[&str], enabled: &BTreeSet<String>) -> Vec<FeatureStatus> {
    names
        .iter()
        .map(|name| FeatureStatus {
            name: name.to_string(),
            enabled: enabled.iter().any(|id| id.eq_ignore_ascii_case(name)),
        })
        .collect()
}

async fn inspect(state: &AppState) -> Result<HostSummary> {
    let default = state.registry.default_tenant()?;
    let mut summary = HostSummary {
        ready: default.state.is_running(),
        last_updated_utc: Utc::now(),
        message: String::new(),
        tenant_count: state.registry.len(),
        default_tenant_state: default.state.to_string(),
        site: SiteState::default(),
        open_id: OpenIdState::default(),
        required_features: statuses(REQUIRED_FEATURES, &BTreeSet::new()),
        other_features: Vec::new(),
        enabled: BTreeSet::new(),
    };
    if !summary.ready {
        summary.message = format!("Default tenant '{}' is not running.", default.name);
        return Ok(summary);
    }

    let lease = state.executor.acquire(&default).await?;
    let features = lease.resolve::<TenantFeatures>()?;
    let enabled = features.enabled().await;
    let site = lease.resolve::<SiteSettingsService>()?.get();

    summary.site = SiteState {
        site_name: site.site_name,
        time_zone_id: site.time_zone_id,
    };
    summary.open_id = OpenIdState {
        applications: lease.resolve::<ApplicationService>()?.list().await?.len(),
        scopes: lease.resolve::<ScopeService>()?.list().await?.len(),
    };
    summary.required_features = statuses(REQUIRED_FEATURES, &enabled);
    summary.other_features = features
        .available()
        .into_iter()
        .filter(|f| !REQUIRED_FEATURES.iter().any(|r| r.eq_ignore_ascii_case(&f.id)))
        .map(|f| FeatureStatus {
            name: f.id.clone(),
            enabled: enabled.contains(&f.id),
        })
        .collect();
    summary.enabled = enabled;
    Ok(summary)
}

pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<HostSummary>> {
    Ok(Json(inspect(&state).await?))
}

pub async fn features(State(state): State<AppState>) -> ApiResult<Json<FeatureReport>> {
    let summary = inspect(&state).await?;
    Ok(Json(FeatureReport {
        ready: summary.ready,
        last_updated_utc: summary.last_updated_utc,
        required_features: summary.required_features,
        other_features: summary.other_features,
    }))
}

pub async fn links(State(state): State<AppState>) -> Json<Vec<InspectionLink>> {
    let settings = &state.settings;
    let prefix = settings.management_prefix.as_str();
    let admin = settings.admin_base_path.as_str();
    let admin_enabled = !settings.disable_admin_path_access;
    let admin_description = |open: &'static str| {
        if admin_enabled {
            open
        } else {
            "Admin path access is disabled. Use the management API instead."
        }
    };

    let api = |name, path: &str, description| InspectionLink {
        name,
        url: path.to_string(),
        description,
        enabled: true,
    };
    let admin_link = |name, path: String, description| InspectionLink {
        name,
        url: path,
        description: admin_description(description),
        enabled: admin_enabled,
    };

    Json(vec![
        api(
            "Host summary",
            &format!("{}/summary", INSPECTION_PREFIX),
            "Tenant count, site settings and feature status",
        ),
        api(
            "Feature status",
            &format!("{}/features", INSPECTION_PREFIX),
            "Required and additional features of the default tenant",
        ),
        api(
            "Capabilities",
            &format!("{}/capabilities", INSPECTION_PREFIX),
            "Headless features and management routes",
        ),
        api("Tenants", &format!("{}/tenants", prefix), "Create, edit, enable and disable tenants"),
        api("Features", &format!("{}/features", prefix), "Enable and disable features"),
        api("Feature profiles", &format!("{}/feature-profiles", prefix), "Feature rules assigned to tenants"),
        api("Site settings", &format!("{}/site-settings", prefix), "Site name, time zone and paging"),
        api("Localization", &format!("{}/localization", prefix), "Default and supported cultures"),
        api("OpenId applications", &format!("{}/openid/applications", prefix), "OpenId client applications"),
        api("OpenId scopes", &format!("{}/openid/scopes", prefix), "OpenId scopes"),
        api("Recipes", &format!("{}/recipes", prefix), "Runnable recipes and their metadata"),
        api("Run recipe", &format!("{}/recipes/execute", prefix), "Run a recipe against a tenant"),
        admin_link("Admin", admin.to_string(), "Admin dashboard"),
        admin_link("Admin tenants", format!("{}/Tenants", admin), "Tenant list and url settings"),
        admin_link("Admin features", format!("{}/Features", admin), "Feature management"),
        admin_link(
            "Admin feature profiles",
            format!("{}/TenantFeatureProfiles/Index", admin),
            "Feature profiles per tenant",
        ),
    ])
}

pub async fn capabilities(State(state): State<AppState>) -> ApiResult<Json<Capabilities>> {
    let summary = inspect(&state).await?;
    let settings = &state.settings;
    let headless_features = statuses(HEADLESS_FEATURES, &summary.enabled);
    let missing_headless_features = headless_features
        .iter()
        .filter(|f| !f.enabled)
        .map(|f| f.name.clone())
        .collect();

    Ok(Json(Capabilities {
        ready: summary.ready,
        last_updated_utc: summary.last_updated_utc,
        mode: "headless-mixed",
        fallback_admin_ui: settings.admin_base_path.clone(),
        admin_path_access_disabled: settings.disable_admin_path_access,
        available_adapters: ADAPTERS
            .iter()
            .map(|path| format!("{}{}", settings.management_prefix, path))
            .collect(),
        allow_anonymous_management_api: settings.allow_anonymous_management_api,
        headless_features,
        missing_headless_features,
    }))
}
