//! Feature catalog: the explicit registration table of every feature the
//! host ships, built once at startup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use trellis_core::{ManagementError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub is_always_enabled: bool,
    pub enabled_by_dependency_only: bool,
    pub default_tenant_only: bool,
    pub is_theme: bool,
}

impl FeatureDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: String::new(),
            description: String::new(),
            dependencies: Vec::new(),
            is_always_enabled: false,
            enabled_by_dependency_only: false,
            default_tenant_only: false,
            is_theme: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn always_enabled(mut self) -> Self {
        self.is_always_enabled = true;
        self
    }

    pub fn enabled_by_dependency_only(mut self) -> Self {
        self.enabled_by_dependency_only = true;
        self
    }

    pub fn default_tenant_only(mut self) -> Self {
        self.default_tenant_only = true;
        self
    }

    pub fn theme(mut self) -> Self {
        self.is_theme = true;
        self
    }
}

/// Immutable id → descriptor table. Ids are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    features: BTreeMap<String, FeatureDescriptor>,
}

impl FeatureCatalog {
    pub fn builder() -> FeatureCatalogBuilder {
        FeatureCatalogBuilder::default()
    }

    pub fn get(&self, id: &str) -> Option<&FeatureDescriptor> {
        self.features.get(&id.trim().to_lowercase())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn features(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.features.values()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn always_enabled(&self) -> BTreeSet<String> {
        self.features()
            .filter(|f| f.is_always_enabled)
            .map(|f| f.id.clone())
            .collect()
    }

    /// `id` and every feature it transitively depends on.
    pub fn dependency_closure(&self, id: &str) -> BTreeSet<String> {
        self.walk(id, |feature| {
            feature
                .dependencies
                .iter()
                .filter_map(|dep| self.get(dep))
                .map(|dep| dep.id.clone())
                .collect()
        })
    }

    /// `id` and every feature that transitively depends on it.
    pub fn dependent_closure(&self, id: &str) -> BTreeSet<String> {
        self.walk(id, |feature| {
            self.features()
                .filter(|candidate| {
                    candidate
                        .dependencies
                        .iter()
                        .any(|dep| dep.eq_ignore_ascii_case(&feature.id))
                })
                .map(|candidate| candidate.id.clone())
                .collect()
        })
    }

    fn walk(
        &self,
        id: &str,
        next: impl Fn(&FeatureDescriptor) -> Vec<String>,
    ) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        if let Some(start) = self.get(id) {
            queue.push_back(start.id.clone());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(feature) = self.get(&current) {
                queue.extend(next(feature));
            }
        }
        visited
    }
}

#[derive(Debug, Default)]
pub struct FeatureCatalogBuilder {
    features: Vec<FeatureDescriptor>,
}

impl FeatureCatalogBuilder {
    pub fn register(mut self, feature: FeatureDescriptor) -> Self {
        self.features.push(feature);
        self
    }

    /// Fails when an id is registered twice or a dependency is unknown.
    pub fn build(self) -> Result<FeatureCatalog> {
        let mut features = BTreeMap::new();
        for feature in self.features {
            let key = feature.id.trim().to_lowercase();
            if key.is_empty() {
                return Err(ManagementError::problem("Feature id cannot be empty."));
            }
            if features.contains_key(&key) {
                return Err(ManagementError::problem(format!(
                    "Feature '{}' is registered more than once.",
                    feature.id
                )));
            }
            features.insert(key, feature);
        }

        for feature in features.values() {
            for dependency in &feature.dependencies {
                if !features.contains_key(&dependency.trim().to_lowercase()) {
                    return Err(ManagementError::problem(format!(
                        "Feature '{}' depends on unknown feature '{}'.",
                        feature.id, dependency
                    )));
                }
            }
        }

        Ok(FeatureCatalog { features })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FeatureCatalog {
        FeatureCatalog::builder()
            .register(FeatureDescriptor::new("Core").always_enabled())
            .register(FeatureDescriptor::new("Roles").depends_on(["Core"]))
            .register(FeatureDescriptor::new("Users").depends_on(["Roles"]))
            .register(FeatureDescriptor::new("OpenId").depends_on(["Users"]))
            .register(FeatureDescriptor::new("TheDarkTheme").theme())
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = catalog();
        assert_eq!(catalog.get("users").unwrap().id, "Users");
        assert!(!catalog.contains("Missing"));
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_closures() {
        let catalog = catalog();
        let deps: Vec<_> = catalog.dependency_closure("OpenId").into_iter().collect();
        assert_eq!(deps, vec!["Core", "OpenId", "Roles", "Users"]);

        let dependents: Vec<_> = catalog.dependent_closure("Roles").into_iter().collect();
        assert_eq!(dependents, vec!["OpenId", "Roles", "Users"]);

        assert!(catalog.dependency_closure("Missing").is_empty());
    }

    #[test]
    fn test_always_enabled() {
        assert_eq!(
            catalog().always_enabled().into_iter().collect::<Vec<_>>(),
            vec!["Core"]
        );
    }

    #[test]
    fn test_build_rejects_unknown_dependency_and_duplicates() {
        let err = FeatureCatalog::builder()
            .register(FeatureDescriptor::new("A").depends_on(["B"]))
            .build()
            .unwrap_err();
        assert!(err.message().contains("unknown feature 'B'"));

        let err = FeatureCatalog::builder()
            .register(FeatureDescriptor::new("A"))
            .register(FeatureDescriptor::new("a"))
            .build()
            .unwrap_err();
        assert!(err.message().contains("more than once"));
    }
}
