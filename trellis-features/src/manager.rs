//! Per-tenant feature manager.

use crate::catalog::{FeatureCatalog, FeatureDescriptor};
use crate::profile::ProfilePolicy;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Enabled feature ids of one tenant, stored with canonical catalog casing.
#[derive(Debug, Clone)]
pub struct EnabledFeatures {
    ids: BTreeSet<String>,
    updated_at: DateTime<Utc>,
}

impl EnabledFeatures {
    /// Starts with the always-enabled features.
    pub fn seeded(catalog: &FeatureCatalog) -> Self {
        Self {
            ids: catalog.always_enabled(),
            updated_at: Utc::now(),
        }
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Shared handle to a tenant's enabled set; survives context rebuilds.
pub type FeatureState = Arc<Mutex<EnabledFeatures>>;

pub fn feature_state(catalog: &FeatureCatalog) -> FeatureState {
    Arc::new(Mutex::new(EnabledFeatures::seeded(catalog)))
}

/// Ids whose state actually changed in one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureChanges {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

impl FeatureChanges {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty()
    }
}

/// Feature view of one tenant: availability, always-enabled features and
/// the enabled set.
pub struct TenantFeatures {
    tenant: String,
    is_default: bool,
    catalog: Arc<FeatureCatalog>,
    policy: ProfilePolicy,
    state: FeatureState,
}

impl TenantFeatures {
    pub fn new(
        tenant: impl Into<String>,
        is_default: bool,
        catalog: Arc<FeatureCatalog>,
        policy: ProfilePolicy,
        state: FeatureState,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            is_default,
            catalog,
            policy,
            state,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    fn is_available(&self, feature: &FeatureDescriptor) -> bool {
        !feature.is_theme
            && (self.is_default || !feature.default_tenant_only)
            && self.policy.allows(feature)
    }

    /// Non-theme features this tenant may use.
    pub fn available(&self) -> Vec<&FeatureDescriptor> {
        self.catalog
            .features()
            .filter(|f| self.is_available(f))
            .collect()
    }

    /// The available feature with this id, case-insensitive.
    pub fn find_available(&self, id: &str) -> Option<&FeatureDescriptor> {
        self.catalog.get(id).filter(|f| self.is_available(f))
    }

    pub fn always_enabled(&self) -> BTreeSet<String> {
        self.catalog.always_enabled()
    }

    /// Transitive dependencies of `id` this tenant may not use.
    pub fn unavailable_dependencies(&self, id: &str) -> BTreeSet<String> {
        self.catalog
            .dependency_closure(id)
            .into_iter()
            .filter(|dep| self.find_available(dep).is_none())
            .collect()
    }

    pub async fn enabled(&self) -> BTreeSet<String> {
        self.state.lock().await.ids.clone()
    }

    /// Exclusive access to the enabled set for a validate-then-apply sequence.
    pub async fn session(&self) -> FeatureSession<'_> {
        FeatureSession {
            features: self,
            state: self.state.lock().await,
        }
    }
}

pub struct FeatureSession<'a> {
    features: &'a TenantFeatures,
    state: MutexGuard<'a, EnabledFeatures>,
}

impl FeatureSession<'_> {
    pub fn enabled(&self) -> &BTreeSet<String> {
        &self.state.ids
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.updated_at
    }

    /// Apply disables then enables, cascading through the dependency graph.
    ///
    /// Enabling a feature also enables its missing dependencies; disabling
    /// one also disables its enabled dependents. When `force` is false a
    /// request that would cascade is skipped for that feature. Always-enabled
    /// features are never disabled, and features enabled by dependency only
    /// are dropped once nothing enabled depends on them. A feature is never
    /// enabled when it or any of its dependencies is unavailable to the tenant.
    pub fn apply(&mut self, enable: &[String], disable: &[String], force: bool) -> FeatureChanges {
        let catalog = self.features.catalog.clone();
        let always = catalog.always_enabled();
        let before = self.state.ids.clone();
        let mut ids = before.clone();

        for id in disable {
            let Some(feature) = catalog.get(id) else { continue };
            if !ids.contains(&feature.id) {
                continue;
            }
            let affected: BTreeSet<String> = catalog
                .dependent_closure(&feature.id)
                .into_iter()
                .filter(|dep| ids.contains(dep))
                .collect();
            if affected.iter().any(|dep| always.contains(dep)) {
                debug!(feature = %feature.id, "Skipping disable required by an always-enabled feature");
                continue;
            }
            if !force && affected.len() > 1 {
                debug!(feature = %feature.id, "Skipping disable that would cascade without force");
                continue;
            }
            for dep in affected {
                ids.remove(&dep);
            }
        }

        for id in enable {
            let Some(feature) = self.features.find_available(id) else { continue };
            if !self.features.unavailable_dependencies(&feature.id).is_empty() {
                debug!(feature = %feature.id, "Skipping enable that needs an unavailable dependency");
                continue;
            }
            let affected: BTreeSet<String> = catalog
                .dependency_closure(&feature.id)
                .into_iter()
                .filter(|dep| !ids.contains(dep))
                .collect();
            if !force && affected.len() > 1 {
                debug!(feature = %feature.id, "Skipping enable that would cascade without force");
                continue;
            }
            ids.extend(affected);
        }

        Self::drop_orphaned(&catalog, &mut ids, &before);
        ids.extend(always);

        let changes = FeatureChanges {
            enabled: ids.difference(&before).cloned().collect(),
            disabled: before.difference(&ids).cloned().collect(),
        };
        if !changes.is_empty() {
            self.state.ids = ids;
            self.state.updated_at = Utc::now();
        }
        changes
    }

    /// Remove dependency-only features that lost their last enabled
    /// dependent in this update.
    fn drop_orphaned(catalog: &FeatureCatalog, ids: &mut BTreeSet<String>, before: &BTreeSet<String>) {
        loop {
            let orphan = ids.iter().find(|id| {
                catalog.get(id).is_some_and(|f| {
                    f.enabled_by_dependency_only
                        && !f.is_always_enabled
                        && before.contains(&f.id)
                        && !catalog
                            .dependent_closure(&f.id)
                            .iter()
                            .any(|dep| dep != &f.id && ids.contains(dep))
                })
            });
            match orphan.cloned() {
                Some(id) => {
                    ids.remove(&id);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{FeatureProfile, FeatureRule};

    fn catalog() -> Arc<FeatureCatalog> {
        Arc::new(
            FeatureCatalog::builder()
                .register(FeatureDescriptor::new("Core").always_enabled())
                .register(FeatureDescriptor::new("Roles").depends_on(["Core"]))
                .register(FeatureDescriptor::new("Users").depends_on(["Roles"]))
                .register(FeatureDescriptor::new("Workflows"))
                .register(FeatureDescriptor::new("Scripting").enabled_by_dependency_only())
                .register(FeatureDescriptor::new("Rules").depends_on(["Scripting"]))
                .register(FeatureDescriptor::new("Tenants").default_tenant_only())
                .register(FeatureDescriptor::new("Agency").theme())
                .build()
                .unwrap(),
        )
    }

    fn features(is_default: bool, policy: ProfilePolicy) -> TenantFeatures {
        let catalog = catalog();
        let state = feature_state(&catalog);
        TenantFeatures::new("t", is_default, catalog, policy, state)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_seeded_with_always_enabled() {
        let features = features(true, ProfilePolicy::default());
        assert_eq!(features.enabled().await.into_iter().collect::<Vec<_>>(), vec!["Core"]);
    }

    #[tokio::test]
    async fn test_availability() {
        let available = |f: &TenantFeatures| {
            f.available()
                .into_iter()
                .map(|d| d.id.clone())
                .collect::<Vec<_>>()
        };

        let default = features(true, ProfilePolicy::default());
        assert!(available(&default).contains(&"Tenants".to_string()));
        assert!(!available(&default).contains(&"Agency".to_string()));

        let tenant = features(false, ProfilePolicy::default());
        assert!(!available(&tenant).contains(&"Tenants".to_string()));

        let policy = ProfilePolicy::from_profiles(&[FeatureProfile {
            id: "p".into(),
            name: "p".into(),
            feature_rules: vec![FeatureRule::exclude("Work*")],
        }])
        .unwrap();
        let restricted = features(false, policy);
        assert!(restricted.find_available("workflows").is_none());
        assert!(restricted.find_available("users").is_some());
    }

    #[tokio::test]
    async fn test_enable_cascades_dependencies_with_force() {
        let features = features(true, ProfilePolicy::default());
        let mut session = features.session().await;

        let changes = session.apply(&ids(&["Users"]), &[], true);
        assert_eq!(changes.enabled, ids(&["Roles", "Users"]));
        assert!(changes.disabled.is_empty());
    }

    #[tokio::test]
    async fn test_enable_never_reaches_unavailable_dependencies() {
        let policy = ProfilePolicy::from_profiles(&[FeatureProfile {
            id: "p".into(),
            name: "p".into(),
            feature_rules: vec![FeatureRule::exclude("Roles")],
        }])
        .unwrap();
        let features = features(false, policy);
        assert_eq!(
            features.unavailable_dependencies("Users"),
            BTreeSet::from(["Roles".to_string()])
        );

        let mut session = features.session().await;
        let changes = session.apply(&ids(&["Users", "Workflows", "Tenants"]), &[], true);
        assert_eq!(changes.enabled, ids(&["Workflows"]));
        assert!(!session.enabled().contains("Roles"));
        assert!(!session.enabled().contains("Users"));
    }

    #[tokio::test]
    async fn test_without_force_cascading_request_is_skipped() {
        let features = features(true, ProfilePolicy::default());
        let mut session = features.session().await;

        let changes = session.apply(&ids(&["Users"]), &[], false);
        assert!(changes.is_empty());

        let changes = session.apply(&ids(&["Roles"]), &[], false);
        assert_eq!(changes.enabled, ids(&["Roles"]));
        let changes = session.apply(&ids(&["Users"]), &[], false);
        assert_eq!(changes.enabled, ids(&["Users"]));

        let changes = session.apply(&[], &ids(&["Roles"]), false);
        assert!(changes.is_empty());
        let changes = session.apply(&[], &ids(&["Roles"]), true);
        assert_eq!(changes.disabled, ids(&["Roles", "Users"]));
    }

    #[tokio::test]
    async fn test_always_enabled_never_disabled() {
        let features = features(true, ProfilePolicy::default());
        let mut session = features.session().await;
        session.apply(&ids(&["Roles"]), &[], true);

        let changes = session.apply(&[], &ids(&["Core"]), true);
        assert!(changes.is_empty());
        assert!(session.enabled().contains("Core"));
        assert!(session.enabled().contains("Roles"));
    }

    #[tokio::test]
    async fn test_dependency_only_feature_follows_dependents() {
        let features = features(true, ProfilePolicy::default());
        let mut session = features.session().await;

        let changes = session.apply(&ids(&["Rules"]), &[], true);
        assert_eq!(changes.enabled, ids(&["Rules", "Scripting"]));

        let changes = session.apply(&[], &ids(&["rules"]), true);
        assert_eq!(changes.disabled, ids(&["Rules", "Scripting"]));
    }

    #[tokio::test]
    async fn test_noop_keeps_timestamp() {
        let features = features(true, ProfilePolicy::default());
        let mut session = features.session().await;
        let before = session.updated_at();
        let changes = session.apply(&[], &ids(&["Workflows"]), true);
        assert!(changes.is_empty());
        assert_eq!(session.updated_at(), before);
    }
}
