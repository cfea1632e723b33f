// Recipe execution environment

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use trellis_core::Result;

/// Case-insensitive variable map handed to a recipe execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeEnvironment {
    // lowercase key -> (original key, value)
    values: BTreeMap<String, (String, Value)>,
}

impl RecipeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; blank keys are ignored.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.values
            .insert(key.to_lowercase(), (key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(&key.trim().to_lowercase()).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.values().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for RecipeEnvironment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Contributes default variables before caller overrides are applied.
#[async_trait]
pub trait RecipeEnvironmentProvider: Send + Sync {
    /// Lower values run first.
    fn order(&self) -> i32 {
        0
    }

    async fn populate(&self, environment: &mut RecipeEnvironment) -> Result<()>;
}

/// Fixed variables.
pub struct StaticEnvironmentProvider {
    order: i32,
    values: Vec<(String, Value)>,
}

impl StaticEnvironmentProvider {
    pub fn new(order: i32) -> Self {
        Self {
            order,
            values: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl RecipeEnvironmentProvider for StaticEnvironmentProvider {
    fn order(&self) -> i32 {
        self.order
    }

    async fn populate(&self, environment: &mut RecipeEnvironment) -> Result<()> {
        for (key, value) in &self.values {
            environment.insert(key, value.clone());
        }
        Ok(())
    }
}

/// Run providers in ascending order, then apply caller overrides.
pub async fn build_environment(
    providers: &[Arc<dyn RecipeEnvironmentProvider>],
    overrides: Option<&HashMap<String, String>>,
) -> Result<RecipeEnvironment> {
    let mut ordered: Vec<_> = providers.iter().collect();
    ordered.sort_by_key(|p| p.order());

    let mut environment = RecipeEnvironment::new();
    for provider in ordered {
        provider.populate(&mut environment).await?;
    }
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            environment.insert(key, value.clone());
        }
    }
    Ok(environment)
}
