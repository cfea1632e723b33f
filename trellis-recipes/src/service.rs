// Recipe listing and on-demand execution

use crate::catalog::{RecipeSelector, match_recipe, runnable_recipes};
use crate::descriptor::{RecipeDescriptor, RecipeItem};
use crate::environment::{RecipeEnvironmentProvider, build_environment};
use crate::executor::{RecipeExecutionResult, RecipeExecutor};
use crate::harvester::RecipeHarvester;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trellis_core::Result;
use uuid::Uuid;

fn default_release() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRecipeRequest {
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub recipe_id: Option<String>,
    #[serde(default)]
    pub recipe_name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub environment: Option<HashMap<String, String>>,
    #[serde(default = "default_release")]
    pub release_shell_context: bool,
}

impl Default for ExecuteRecipeRequest {
    fn default() -> Self {
        Self {
            tenant: None,
            recipe_id: None,
            recipe_name: None,
            file_name: None,
            environment: None,
            release_shell_context: true,
        }
    }
}

impl ExecuteRecipeRequest {
    pub fn selector(&self) -> RecipeSelector {
        RecipeSelector {
            recipe_id: self.recipe_id.clone(),
            recipe_name: self.recipe_name.clone(),
            file_name: self.file_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeExecution {
    pub execution_id: String,
    pub result: RecipeExecutionResult,
    pub tenant: String,
    pub recipe_id: String,
    pub recipe_name: String,
    pub display_name: String,
    pub base_path: String,
    pub file_name: String,
    pub released_shell_context: bool,
}

/// Recipe operations inside one tenant context.
pub struct RecipeService {
    tenant: String,
    harvesters: Vec<Arc<dyn RecipeHarvester>>,
    environment: Vec<Arc<dyn RecipeEnvironmentProvider>>,
    executor: Arc<dyn RecipeExecutor>,
}

impl RecipeService {
    pub fn new(
        tenant: impl Into<String>,
        harvesters: Vec<Arc<dyn RecipeHarvester>>,
        environment: Vec<Arc<dyn RecipeEnvironmentProvider>>,
        executor: Arc<dyn RecipeExecutor>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            harvesters,
            environment,
            executor,
        }
    }

    pub fn harvesters(&self) -> &[Arc<dyn RecipeHarvester>] {
        &self.harvesters
    }

    pub async fn list(&self) -> Result<Vec<RecipeItem>> {
        Ok(runnable_recipes(&self.harvesters)
            .await?
            .iter()
            .map(RecipeItem::from)
            .collect())
    }

    /// Run `recipe` with the provider environment plus `overrides`.
    pub async fn run(
        &self,
        recipe: &RecipeDescriptor,
        overrides: Option<&HashMap<String, String>>,
        cancel: &CancellationToken,
    ) -> Result<RecipeExecutionResult> {
        let environment = build_environment(&self.environment, overrides).await?;
        let execution_id = Uuid::new_v4().simple().to_string();
        Ok(self
            .executor
            .execute(&execution_id, recipe, &environment, cancel)
            .await?)
    }

    /// Match the request against the runnable catalog and execute it.
    ///
    /// Releasing the tenant context afterwards is up to the caller.
    pub async fn execute(
        &self,
        request: &ExecuteRecipeRequest,
        cancel: &CancellationToken,
    ) -> Result<RecipeExecution> {
        let recipes = runnable_recipes(&self.harvesters).await?;
        let recipe = match_recipe(&recipes, &request.selector())?;
        let result = self
            .run(recipe, request.environment.as_ref(), cancel)
            .await?;

        Ok(RecipeExecution {
            execution_id: result.execution_id.clone(),
            tenant: self.tenant.clone(),
            recipe_id: recipe.id(),
            recipe_name: recipe.name.clone(),
            display_name: if recipe.display_name.trim().is_empty() {
                recipe.name.clone()
            } else {
                recipe.display_name.clone()
            },
            base_path: recipe.base_path.clone(),
            file_name: recipe.file_name.clone(),
            released_shell_context: request.release_shell_context,
            result,
        })
    }
}
