// Recipe harvesters

use crate::descriptor::RecipeDescriptor;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};
use trellis_core::{ManagementError, Result};

pub const RECIPE_FILE_SUFFIX: &str = ".recipe.json";

#[async_trait]
pub trait RecipeHarvester: Send + Sync {
    async fn harvest(&self) -> Result<Vec<RecipeDescriptor>>;
}

/// Recipes registered in code.
pub struct StaticRecipeHarvester {
    recipes: Vec<RecipeDescriptor>,
}

impl StaticRecipeHarvester {
    pub fn new(recipes: Vec<RecipeDescriptor>) -> Self {
        Self { recipes }
    }
}

#[async_trait]
impl RecipeHarvester for StaticRecipeHarvester {
    async fn harvest(&self) -> Result<Vec<RecipeDescriptor>> {
        Ok(self.recipes.clone())
    }
}

/// Reads `*.recipe.json` files below a directory.
///
/// `basePath` is the directory relative to the root (empty for the root
/// itself). Files that fail to parse are skipped with a warning.
pub struct FileRecipeHarvester {
    root: PathBuf,
}

impl FileRecipeHarvester {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, path: PathBuf) -> Option<RecipeDescriptor> {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read recipe file");
                return None;
            }
        };
        let mut recipe: RecipeDescriptor = match serde_json::from_str(&content) {
            Ok(recipe) => recipe,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse recipe file");
                return None;
            }
        };

        recipe.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        recipe.base_path = path
            .parent()
            .and_then(|p| p.strip_prefix(&self.root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        Some(recipe)
    }
}

#[async_trait]
impl RecipeHarvester for FileRecipeHarvester {
    async fn harvest(&self) -> Result<Vec<RecipeDescriptor>> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            debug!(root = %self.root.display(), "Recipe directory does not exist");
            return Ok(Vec::new());
        }

        let mut recipes = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                ManagementError::problem(format!(
                    "Failed to read recipe directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                ManagementError::problem(format!("Failed to read recipe directory entry: {}", e))
            })? {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(_) => continue,
                };
                if file_type.is_dir() {
                    pending.push(path);
                } else if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase().ends_with(RECIPE_FILE_SUFFIX))
                    && let Some(recipe) = self.read(path).await
                {
                    recipes.push(recipe);
                }
            }
        }

        debug!(root = %self.root.display(), count = recipes.len(), "Harvested recipe files");
        Ok(recipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_harvester() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        std::fs::write(
            dir.path().join("saas.recipe.json"),
            r#"{"name":"SaaS","isSetupRecipe":true}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("blog").join("blog.recipe.json"),
            r#"{"name":"Blog","steps":[{"name":"feature","enable":["Blog"]}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.recipe.json"), "{ nope").unwrap();
        std::fs::write(dir.path().join("notes.json"), r#"{"name":"Ignored"}"#).unwrap();

        let mut recipes = FileRecipeHarvester::new(dir.path()).harvest().await.unwrap();
        recipes.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].name, "Blog");
        assert_eq!(recipes[0].base_path, "blog");
        assert_eq!(recipes[0].file_name, "blog.recipe.json");
        assert_eq!(recipes[1].base_path, "");
        assert!(recipes[1].is_setup_recipe);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let harvester = FileRecipeHarvester::new("/definitely/not/here");
        assert!(harvester.harvest().await.unwrap().is_empty());
    }
}
