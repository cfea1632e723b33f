//! Feature toggle engine and feature payloads.

use crate::manager::{FeatureSession, TenantFeatures};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::info;
use trellis_core::names::normalize_names;
use trellis_core::{ManagementError, Result};

fn default_force() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureToggleRequest {
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub disable: Vec<String>,
    #[serde(default = "default_force")]
    pub force: bool,
}

impl Default for FeatureToggleRequest {
    fn default() -> Self {
        Self {
            tenant: None,
            enable: Vec::new(),
            disable: Vec::new(),
            force: true,
        }
    }
}

impl FeatureToggleRequest {
    pub fn enable<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enable: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn disable<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disable: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub enabled: bool,
    pub is_always_enabled: bool,
    pub enabled_by_dependency_only: bool,
    pub default_tenant_only: bool,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePayload {
    pub tenant: String,
    pub updated_at_utc: DateTime<Utc>,
    pub features: Vec<FeatureItem>,
}

impl FeaturePayload {
    pub fn feature(&self, id: &str) -> Option<&FeatureItem> {
        self.features.iter().find(|f| f.id.eq_ignore_ascii_case(id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangedFeatures {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureToggleResult {
    #[serde(flatten)]
    pub payload: FeaturePayload,
    pub changed: ChangedFeatures,
    pub applied_tenant: String,
}

fn by_category_then_name(a: &FeatureItem, b: &FeatureItem) -> Ordering {
    a.category
        .to_lowercase()
        .cmp(&b.category.to_lowercase())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

fn build_payload(features: &TenantFeatures, session: &FeatureSession<'_>) -> FeaturePayload {
    let enabled = session.enabled();
    let mut items: Vec<FeatureItem> = features
        .available()
        .into_iter()
        .map(|feature| {
            let mut dependencies = feature.dependencies.clone();
            dependencies.sort_by_key(|d| d.to_lowercase());
            FeatureItem {
                id: feature.id.clone(),
                name: feature.name.clone(),
                category: feature.category.clone(),
                description: feature.description.clone(),
                enabled: enabled.contains(&feature.id),
                is_always_enabled: feature.is_always_enabled,
                enabled_by_dependency_only: feature.enabled_by_dependency_only,
                default_tenant_only: feature.default_tenant_only,
                dependencies,
            }
        })
        .collect();
    items.sort_by(by_category_then_name);

    FeaturePayload {
        tenant: features.tenant().to_string(),
        updated_at_utc: session.updated_at(),
        features: items,
    }
}

/// Current features of the tenant.
pub async fn feature_payload(features: &TenantFeatures) -> FeaturePayload {
    let session = features.session().await;
    build_payload(features, &session)
}

/// Validate and apply a toggle request as a single step.
///
/// Unknown ids, always-enabled ids in `disable` and enables that need an
/// unavailable dependency reject the whole request before anything changes.
/// An id in both lists is disabled first and then enabled.
pub async fn toggle_features(
    features: &TenantFeatures,
    request: &FeatureToggleRequest,
) -> Result<FeatureToggleResult> {
    let enable = normalize_names(&request.enable);
    let disable = normalize_names(&request.disable);
    let mut session = features.session().await;

    let unknown: Vec<&String> = enable
        .iter()
        .chain(disable.iter())
        .filter(|id| features.find_available(id).is_none())
        .collect();
    if !unknown.is_empty() {
        return Err(
            ManagementError::invalid("Unknown feature ids detected.").with_detail("unknown", unknown)
        );
    }

    let always = features.always_enabled();
    let blocked: Vec<&String> = disable
        .iter()
        .filter(|id| always.iter().any(|a| a.eq_ignore_ascii_case(id)))
        .collect();
    if !blocked.is_empty() {
        return Err(
            ManagementError::invalid("Always enabled features cannot be disabled.")
                .with_detail("blocked", blocked),
        );
    }

    let blocked: BTreeSet<String> = enable
        .iter()
        .flat_map(|id| features.unavailable_dependencies(id))
        .collect();
    if !blocked.is_empty() {
        return Err(ManagementError::invalid(
            "Required feature dependencies are not available to this tenant.",
        )
        .with_detail("blocked", blocked));
    }

    let changes = session.apply(&enable, &disable, request.force);
    info!(
        tenant = %features.tenant(),
        enabled = ?changes.enabled,
        disabled = ?changes.disabled,
        "Features updated"
    );

    Ok(FeatureToggleResult {
        payload: build_payload(features, &session),
        changed: ChangedFeatures {
            enabled: changes.enabled,
            disabled: changes.disabled,
        },
        applied_tenant: features.tenant().to_string(),
    })
}
