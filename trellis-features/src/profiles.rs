//! Feature profile upsert and listing.

use crate::profile::{FeatureProfile, FeatureProfileStore, FeatureRule, ProfilePolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use trellis_core::names::non_blank;
use trellis_core::{ManagementError, Result};
use trellis_tenancy::{ContextProvider, TenantRegistry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertFeatureProfileRequest {
    pub id: String,
    pub name: Option<String>,
    pub feature_rules: Vec<FeatureRule>,
    pub delete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProfileItem {
    pub id: String,
    pub name: String,
    pub feature_rules: Vec<FeatureRule>,
    pub assigned_tenants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpsertOutcome {
    Saved(FeatureProfileItem),
    Removed(String),
}

pub struct FeatureProfileService {
    store: Arc<FeatureProfileStore>,
    registry: Arc<TenantRegistry>,
    contexts: Arc<dyn ContextProvider>,
}

impl FeatureProfileService {
    pub fn new(
        store: Arc<FeatureProfileStore>,
        registry: Arc<TenantRegistry>,
        contexts: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            store,
            registry,
            contexts,
        }
    }

    pub fn store(&self) -> &Arc<FeatureProfileStore> {
        &self.store
    }

    fn assigned_tenants(&self, profile_id: &str) -> Vec<String> {
        self.registry
            .list()
            .into_iter()
            .filter(|tenant| tenant.has_profile(profile_id))
            .map(|tenant| tenant.name)
            .collect()
    }

    fn item(&self, profile: FeatureProfile) -> FeatureProfileItem {
        FeatureProfileItem {
            assigned_tenants: self.assigned_tenants(&profile.id),
            id: profile.id,
            name: profile.name,
            feature_rules: profile.feature_rules,
        }
    }

    /// Cached contexts of assigned tenants were built with the old rules.
    fn evict_assigned(&self, profile_id: &str) {
        for tenant in self.assigned_tenants(profile_id) {
            self.contexts.evict(&tenant);
        }
    }

    /// Every profile with its assigned tenants, ordered by id.
    pub fn list(&self) -> Vec<FeatureProfileItem> {
        self.store
            .list()
            .into_iter()
            .map(|profile| self.item(profile))
            .collect()
    }

    pub fn upsert(&self, request: UpsertFeatureProfileRequest) -> Result<ProfileUpsertOutcome> {
        let id = request.id.trim().to_string();
        if id.is_empty() {
            return Err(ManagementError::invalid("Profile id is required."));
        }

        if request.delete {
            let removed = self.store.remove(&id).map(|p| p.id).unwrap_or(id);
            self.evict_assigned(&removed);
            info!(profile = %removed, "Feature profile removed");
            return Ok(ProfileUpsertOutcome::Removed(removed));
        }

        let invalid: Vec<usize> = request
            .feature_rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.rule.trim().is_empty() || r.expression.trim().is_empty())
            .map(|(index, _)| index)
            .collect();
        if !invalid.is_empty() {
            return Err(
                ManagementError::invalid("Each feature rule requires a rule and an expression.")
                    .with_detail("invalidRules", invalid),
            );
        }

        let profile = FeatureProfile {
            name: non_blank(request.name.as_deref()).unwrap_or_else(|| id.clone()),
            id,
            feature_rules: request
                .feature_rules
                .iter()
                .map(|r| FeatureRule {
                    rule: r.rule.trim().to_string(),
                    expression: r.expression.trim().to_string(),
                })
                .collect(),
        };
        ProfilePolicy::from_profiles([&profile])?;

        self.store.save(profile.clone());
        self.evict_assigned(&profile.id);
        info!(profile = %profile.id, rules = profile.feature_rules.len(), "Feature profile saved");
        Ok(ProfileUpsertOutcome::Saved(self.item(profile)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use trellis_tenancy::{Tenant, TenantContext};

    #[derive(Default)]
    struct EvictionLog(Mutex<Vec<String>>);

    #[async_trait]
    impl ContextProvider for EvictionLog {
        async fn acquire(&self, _tenant: &Tenant) -> Result<Arc<TenantContext>> {
            Err(ManagementError::problem("not used"))
        }

        fn release(&self, _context: &TenantContext) {}

        fn evict(&self, tenant_name: &str) {
            self.0.lock().push(tenant_name.to_string());
        }
    }

    fn service() -> (Arc<EvictionLog>, FeatureProfileService) {
        let registry = Arc::new(TenantRegistry::new(Tenant::default_tenant("Default")));
        registry
            .insert(Tenant::new("beta").with_feature_profiles(["Basic"]))
            .unwrap();
        registry
            .insert(Tenant::new("alpha").with_feature_profiles(["basic", "pro"]))
            .unwrap();
        registry.insert(Tenant::new("gamma")).unwrap();

        let log = Arc::new(EvictionLog::default());
        let service = FeatureProfileService::new(
            Arc::new(FeatureProfileStore::new()),
            registry,
            log.clone(),
        );
        (log, service)
    }

    fn request(id: &str, rules: Vec<FeatureRule>) -> UpsertFeatureProfileRequest {
        UpsertFeatureProfileRequest {
            id: id.into(),
            feature_rules: rules,
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_defaults_name_and_lists_assignments() {
        let (log, service) = service();
        let outcome = service
            .upsert(request(" Basic ", vec![FeatureRule::exclude(" Trellis.OpenId* ")]))
            .unwrap();

        let ProfileUpsertOutcome::Saved(item) = outcome else {
            panic!("expected saved profile");
        };
        assert_eq!(item.id, "Basic");
        assert_eq!(item.name, "Basic");
        assert_eq!(item.feature_rules[0].expression, "Trellis.OpenId*");
        assert_eq!(item.assigned_tenants, vec!["alpha", "beta"]);
        assert_eq!(*log.0.lock(), vec!["alpha", "beta"]);

        let listed = service.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].assigned_tenants, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let (_, service) = service();
        service.upsert(request("Basic", vec![])).unwrap();
        let mut update = request("basic", vec![FeatureRule::include("*")]);
        update.name = Some("Basic plan".into());
        service.upsert(update).unwrap();

        let listed = service.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Basic plan");
        assert_eq!(listed[0].feature_rules.len(), 1);
    }

    #[test]
    fn test_blank_id_and_blank_rules() {
        let (_, service) = service();
        let err = service.upsert(request("  ", vec![])).unwrap_err();
        assert_eq!(err.message(), "Profile id is required.");

        let rules = vec![
            FeatureRule::include("*"),
            FeatureRule {
                rule: "Exclude".into(),
                expression: " ".into(),
            },
        ];
        let err = service.upsert(request("Basic", rules)).unwrap_err();
        assert_eq!(err.detail("invalidRules"), Some(&serde_json::json!([1])));
        assert!(service.list().is_empty());
    }

    #[test]
    fn test_delete() {
        let (_, service) = service();
        service.upsert(request("Pro", vec![])).unwrap();

        let mut delete = request("PRO", vec![]);
        delete.delete = true;
        let outcome = service.upsert(delete.clone()).unwrap();
        assert_eq!(outcome, ProfileUpsertOutcome::Removed("Pro".into()));
        assert!(service.list().is_empty());

        let outcome = service.upsert(delete).unwrap();
        assert_eq!(outcome, ProfileUpsertOutcome::Removed("PRO".into()));
    }

    #[test]
    fn test_delete_unknown_profile_evicts_assigned_tenants() {
        let (log, service) = service();
        let mut delete = request("basic", vec![]);
        delete.delete = true;

        let outcome = service.upsert(delete).unwrap();
        assert_eq!(outcome, ProfileUpsertOutcome::Removed("basic".into()));
        assert_eq!(*log.0.lock(), vec!["alpha", "beta"]);
    }
}
