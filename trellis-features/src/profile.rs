//! Feature profiles: reusable include/exclude rule sets assigned to tenants.

use crate::catalog::FeatureDescriptor;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trellis_core::{ManagementError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Include,
    Exclude,
}

impl RuleKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "include" => Some(RuleKind::Include),
            "exclude" => Some(RuleKind::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRule {
    pub rule: String,
    pub expression: String,
}

impl FeatureRule {
    pub fn include(expression: impl Into<String>) -> Self {
        Self {
            rule: "Include".into(),
            expression: expression.into(),
        }
    }

    pub fn exclude(expression: impl Into<String>) -> Self {
        Self {
            rule: "Exclude".into(),
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProfile {
    pub id: String,
    pub name: String,
    pub feature_rules: Vec<FeatureRule>,
}

struct CompiledRule {
    kind: RuleKind,
    pattern: Regex,
}

/// Wildcard expression (`*` matches any run of characters) to an anchored,
/// case-insensitive regex.
fn compile_expression(expression: &str) -> Result<Regex> {
    let body = expression
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{}$", body)).map_err(|e| {
        ManagementError::invalid(format!("Invalid feature rule expression '{}'.", expression))
            .with_detail("error", e.to_string())
    })
}

/// Combined rules of every profile assigned to a tenant.
///
/// Rules are evaluated in order and the last matching rule decides. A
/// feature no rule matches is denied as soon as an include rule exists.
#[derive(Default)]
pub struct ProfilePolicy {
    rules: Vec<CompiledRule>,
    has_include: bool,
}

impl ProfilePolicy {
    pub fn from_profiles<'a>(profiles: impl IntoIterator<Item = &'a FeatureProfile>) -> Result<Self> {
        let mut policy = ProfilePolicy::default();
        for profile in profiles {
            for rule in &profile.feature_rules {
                let kind = RuleKind::parse(&rule.rule).ok_or_else(|| {
                    ManagementError::invalid(format!("Unknown feature rule '{}'.", rule.rule))
                })?;
                policy.has_include |= kind == RuleKind::Include;
                policy.rules.push(CompiledRule {
                    kind,
                    pattern: compile_expression(&rule.expression)?,
                });
            }
        }
        Ok(policy)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn allows(&self, feature: &FeatureDescriptor) -> bool {
        if feature.is_always_enabled || self.rules.is_empty() {
            return true;
        }
        match self
            .rules
            .iter()
            .rev()
            .find(|rule| rule.pattern.is_match(&feature.id))
        {
            Some(rule) => rule.kind == RuleKind::Include,
            None => !self.has_include,
        }
    }
}

impl std::fmt::Debug for ProfilePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilePolicy")
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Host-wide profile storage keyed by lowercase id.
#[derive(Default)]
pub struct FeatureProfileStore {
    profiles: RwLock<BTreeMap<String, FeatureProfile>>,
}

impl FeatureProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<FeatureProfile> {
        self.profiles.read().get(&id.trim().to_lowercase()).cloned()
    }

    pub fn list(&self) -> Vec<FeatureProfile> {
        self.profiles.read().values().cloned().collect()
    }

    pub fn save(&self, profile: FeatureProfile) {
        self.profiles
            .write()
            .insert(profile.id.to_lowercase(), profile);
    }

    pub fn remove(&self, id: &str) -> Option<FeatureProfile> {
        self.profiles.write().remove(&id.trim().to_lowercase())
    }

    /// Profiles for the given ids, in the given order. Unknown ids are skipped.
    pub fn resolve(&self, ids: &[String]) -> Vec<FeatureProfile> {
        let profiles = self.profiles.read();
        ids.iter()
            .filter_map(|id| profiles.get(&id.to_lowercase()).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(rules: Vec<FeatureRule>) -> FeatureProfile {
        FeatureProfile {
            id: "p".into(),
            name: "p".into(),
            feature_rules: rules,
        }
    }

    #[test]
    fn test_no_rules_allows_everything() {
        let policy = ProfilePolicy::from_profiles(&[profile(vec![])]).unwrap();
        assert!(policy.is_empty());
        assert!(policy.allows(&FeatureDescriptor::new("Anything")));
    }

    #[test]
    fn test_exclude_only() {
        let policy =
            ProfilePolicy::from_profiles(&[profile(vec![FeatureRule::exclude("Trellis.OpenId*")])])
                .unwrap();
        assert!(!policy.allows(&FeatureDescriptor::new("Trellis.OpenId.Server")));
        assert!(!policy.allows(&FeatureDescriptor::new("trellis.openid")));
        assert!(policy.allows(&FeatureDescriptor::new("Trellis.Users")));
    }

    #[test]
    fn test_include_denies_unmatched_and_last_rule_wins() {
        let policy = ProfilePolicy::from_profiles(&[profile(vec![
            FeatureRule::include("Trellis.*"),
            FeatureRule::exclude("Trellis.Recipes"),
        ])])
        .unwrap();

        assert!(policy.allows(&FeatureDescriptor::new("Trellis.Users")));
        assert!(!policy.allows(&FeatureDescriptor::new("Trellis.Recipes")));
        assert!(!policy.allows(&FeatureDescriptor::new("Other.Thing")));
        assert!(policy.allows(&FeatureDescriptor::new("Other.Core").always_enabled()));
    }

    #[test]
    fn test_expression_is_literal_outside_wildcards() {
        let policy =
            ProfilePolicy::from_profiles(&[profile(vec![FeatureRule::exclude("A.B")])]).unwrap();
        assert!(!policy.allows(&FeatureDescriptor::new("A.B")));
        assert!(policy.allows(&FeatureDescriptor::new("AxB")));
    }

    #[test]
    fn test_unknown_rule_kind() {
        let rule = FeatureRule {
            rule: "Maybe".into(),
            expression: "*".into(),
        };
        assert!(ProfilePolicy::from_profiles(&[profile(vec![rule])]).is_err());
    }

    #[test]
    fn test_store_resolve_in_order() {
        let store = FeatureProfileStore::new();
        for id in ["Basic", "Pro"] {
            store.save(FeatureProfile {
                id: id.into(),
                name: id.into(),
                feature_rules: vec![],
            });
        }

        let resolved = store.resolve(&["pro".into(), "missing".into(), "BASIC".into()]);
        let ids: Vec<_> = resolved.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["Pro", "Basic"]);
        assert!(store.remove("basic").is_some());
        assert!(store.get("Basic").is_none());
    }
}
