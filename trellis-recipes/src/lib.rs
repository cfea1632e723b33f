//! Recipes for Trellis tenants.
//!
//! Recipes are JSON documents made of named steps. They are harvested per
//! tenant, matched by id, name or file name, and executed step by step.
//!
//! ## Features
//!
//! - 📂 **Harvesters** - Recipes registered in code or read from `*.recipe.json` files
//! - 🎯 **Matcher** - Unambiguous selection with candidate ids on conflicts
//! - 🌱 **Environment** - Ordered providers plus caller overrides, `[env:Key]` placeholders
//! - 🪜 **Step Executor** - Handlers keyed by step name, cooperative cancellation
//! - 🧩 **Built-in Steps** - `feature`, `roles` and `settings`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use trellis_recipes::*;
//!
//! let service = RecipeService::new(
//!     "Default",
//!     vec![Arc::new(FileRecipeHarvester::new("recipes"))],
//!     vec![],
//!     Arc::new(StepRecipeExecutor::new().with_handler(Arc::new(SettingsStep::new(site)))),
//! );
//!
//! let request = ExecuteRecipeRequest {
//!     recipe_name: Some("Blog".into()),
//!     ..Default::default()
//! };
//! let execution = service.execute(&request, &CancellationToken::new()).await?;
//! ```

pub mod catalog;
pub mod descriptor;
pub mod environment;
pub mod executor;
pub mod harvester;
pub mod service;
pub mod steps;

pub use catalog::{RecipeSelector, find_setup_recipe, harvest_all, match_recipe, runnable_recipes};
pub use descriptor::{RecipeDescriptor, RecipeItem, RecipeStep, recipe_id};
pub use environment::{
    RecipeEnvironment, RecipeEnvironmentProvider, StaticEnvironmentProvider, build_environment,
};
pub use executor::{
    RecipeExecutionError, RecipeExecutionResult, RecipeExecutor, RecipeStepHandler,
    StepRecipeExecutor, expand_variables, step_errors,
};
pub use harvester::{FileRecipeHarvester, RecipeHarvester, StaticRecipeHarvester};
pub use service::{ExecuteRecipeRequest, RecipeExecution, RecipeService};
pub use steps::{FeatureStep, RolesStep, SettingsStep};
