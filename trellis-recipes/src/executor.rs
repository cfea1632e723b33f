// Step-based recipe execution

use crate::descriptor::{RecipeDescriptor, RecipeStep};
use crate::environment::RecipeEnvironment;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trellis_core::ManagementError;

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[env:([^\]]+)\]").unwrap());

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeExecutionError {
    #[error("Recipe step '{step}' failed: {}", .errors.join("; "))]
    StepFailed { step: String, errors: Vec<String> },

    #[error("Recipe execution was cancelled.")]
    Cancelled,
}

impl From<RecipeExecutionError> for ManagementError {
    fn from(err: RecipeExecutionError) -> Self {
        match err {
            RecipeExecutionError::StepFailed { step, errors } => {
                ManagementError::invalid("Recipe execution failed.")
                    .with_detail("step", step)
                    .with_detail("errors", errors)
            }
            RecipeExecutionError::Cancelled => {
                ManagementError::problem("Recipe execution was cancelled.")
            }
        }
    }
}

/// Flatten a management error into step error lines.
pub fn step_errors(err: &ManagementError) -> Vec<String> {
    let mut errors = vec![err.message().to_string()];
    if let Some(details) = err.details() {
        for (key, value) in details {
            if let Some(values) = value.as_array() {
                let joined: Vec<String> = values
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect();
                errors.push(format!("{}: {}", key, joined.join(", ")));
            }
        }
    }
    errors
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeExecutionResult {
    pub execution_id: String,
    pub recipe_id: String,
    pub steps: Vec<String>,
}

#[async_trait]
pub trait RecipeExecutor: Send + Sync {
    async fn execute(
        &self,
        execution_id: &str,
        recipe: &RecipeDescriptor,
        environment: &RecipeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<RecipeExecutionResult, RecipeExecutionError>;
}

/// Handles steps with a given name.
#[async_trait]
pub trait RecipeStepHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, step: &RecipeStep) -> Result<(), Vec<String>>;
}

/// Replace `[env:Key]` placeholders inside string values.
///
/// A string made only of one placeholder takes the variable's value as is.
pub fn expand_variables(value: &Value, environment: &RecipeEnvironment) -> Result<Value, Vec<String>> {
    match value {
        Value::String(text) => {
            if let Some(caps) = VARIABLE.captures(text)
                && caps[0].len() == text.len()
            {
                let key = caps[1].trim();
                return environment
                    .get(key)
                    .cloned()
                    .ok_or_else(|| vec![format!("Unknown environment variable '{}'.", key)]);
            }

            let mut missing = Vec::new();
            let expanded = VARIABLE.replace_all(text, |caps: &regex::Captures<'_>| {
                let key = caps[1].trim();
                match environment.get(key) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => {
                        missing.push(format!("Unknown environment variable '{}'.", key));
                        String::new()
                    }
                }
            });
            if missing.is_empty() {
                Ok(Value::String(expanded.into_owned()))
            } else {
                Err(missing)
            }
        }
        Value::Array(values) => values
            .iter()
            .map(|v| expand_variables(v, environment))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut expanded = serde_json::Map::new();
            for (key, v) in map {
                expanded.insert(key.clone(), expand_variables(v, environment)?);
            }
            Ok(Value::Object(expanded))
        }
        other => Ok(other.clone()),
    }
}

/// Runs steps in order through handlers matched by step name.
#[derive(Default, Clone)]
pub struct StepRecipeExecutor {
    handlers: Vec<Arc<dyn RecipeStepHandler>>,
}

impl StepRecipeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn RecipeStepHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    fn handler(&self, name: &str) -> Option<&Arc<dyn RecipeStepHandler>> {
        self.handlers
            .iter()
            .find(|h| h.name().eq_ignore_ascii_case(name.trim()))
    }
}

#[async_trait]
impl RecipeExecutor for StepRecipeExecutor {
    async fn execute(
        &self,
        execution_id: &str,
        recipe: &RecipeDescriptor,
        environment: &RecipeEnvironment,
        cancel: &CancellationToken,
    ) -> Result<RecipeExecutionResult, RecipeExecutionError> {
        info!(execution_id, recipe = %recipe.id(), steps = recipe.steps.len(), "Executing recipe");
        let mut executed = Vec::with_capacity(recipe.steps.len());

        for step in &recipe.steps {
            if cancel.is_cancelled() {
                warn!(execution_id, step = %step.name, "Recipe execution cancelled");
                return Err(RecipeExecutionError::Cancelled);
            }
            let failed = |errors| RecipeExecutionError::StepFailed {
                step: step.name.clone(),
                errors,
            };

            let handler = self
                .handler(&step.name)
                .ok_or_else(|| failed(vec![format!("No handler is registered for step '{}'.", step.name)]))?;

            let data = match expand_variables(&Value::Object(step.data.clone()), environment)
                .map_err(failed)?
            {
                Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            let expanded = RecipeStep {
                name: step.name.clone(),
                data,
            };

            handler.execute(&expanded).await.map_err(failed)?;
            debug!(execution_id, step = %step.name, "Recipe step completed");
            executed.push(step.name.clone());
        }

        Ok(RecipeExecutionResult {
            execution_id: execution_id.to_string(),
            recipe_id: recipe.id(),
            steps: executed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl RecipeStepHandler for Recorder {
        fn name(&self) -> &str {
            "record"
        }

        async fn execute(&self, step: &RecipeStep) -> Result<(), Vec<String>> {
            if step.get("fail").is_some() {
                return Err(vec!["Asked to fail.".to_string()]);
            }
            self.seen.lock().unwrap().push(Value::Object(step.data.clone()));
            Ok(())
        }
    }

    fn recipe(steps: Vec<RecipeStep>) -> RecipeDescriptor {
        let mut recipe = RecipeDescriptor::new("Test", "tests", "test.recipe.json");
        recipe.steps = steps;
        recipe
    }

    #[tokio::test]
    async fn test_runs_steps_with_variables() {
        let recorder = Arc::new(Recorder::default());
        let executor = StepRecipeExecutor::new().with_handler(recorder.clone());
        let mut environment = RecipeEnvironment::new();
        environment.insert("SiteName", "Acme");
        environment.insert("Size", 25);

        let result = executor
            .execute(
                "exec-1",
                &recipe(vec![RecipeStep::new(
                    "Record",
                    json!({ "title": "Welcome to [env:sitename]", "size": "[env:Size]" }),
                )]),
                &environment,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.steps, vec!["Record"]);
        assert_eq!(result.recipe_id, "tests|test.recipe.json");
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0], json!({ "title": "Welcome to Acme", "size": 25 }));
    }

    #[tokio::test]
    async fn test_step_failures() {
        let recorder = Arc::new(Recorder::default());
        let executor = StepRecipeExecutor::new().with_handler(recorder.clone());

        let err = executor
            .execute(
                "exec-2",
                &recipe(vec![
                    RecipeStep::new("record", json!({})),
                    RecipeStep::new("record", json!({ "fail": true })),
                    RecipeStep::new("record", json!({})),
                ]),
                &RecipeEnvironment::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RecipeExecutionError::StepFailed {
                step: "record".into(),
                errors: vec!["Asked to fail.".into()],
            }
        );
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);

        let err = executor
            .execute(
                "exec-3",
                &recipe(vec![RecipeStep::new("unknown", json!({}))]),
                &RecipeEnvironment::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        let err = ManagementError::from(err);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.detail("step").unwrap(), &json!("unknown"));
    }

    #[tokio::test]
    async fn test_unknown_variable_fails_step() {
        let executor = StepRecipeExecutor::new().with_handler(Arc::new(Recorder::default()));
        let err = executor
            .execute(
                "exec-4",
                &recipe(vec![RecipeStep::new("record", json!({ "v": "[env:Missing]" }))]),
                &RecipeEnvironment::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecipeExecutionError::StepFailed { ref errors, .. }
                if errors == &vec!["Unknown environment variable 'Missing'.".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let recorder = Arc::new(Recorder::default());
        let executor = StepRecipeExecutor::new().with_handler(recorder.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute(
                "exec-5",
                &recipe(vec![RecipeStep::new("record", json!({}))]),
                &RecipeEnvironment::new(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err, RecipeExecutionError::Cancelled);
        assert_eq!(ManagementError::from(err).status_code(), 500);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
