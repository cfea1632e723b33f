// Recipe descriptors

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HIDDEN_TAG: &str = "hidden";

/// Catalog key of a recipe: `basePath|fileName`.
pub fn recipe_id(base_path: &str, file_name: &str) -> String {
    format!("{}|{}", base_path.trim(), file_name.trim())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub name: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl RecipeStep {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// String array under `key`; non-string entries are skipped.
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.data
            .get(key)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub author: String,
    pub website: String,
    pub version: String,
    pub is_setup_recipe: bool,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub base_path: String,
    pub file_name: String,
    pub steps: Vec<RecipeStep>,
}

impl RecipeDescriptor {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_step(mut self, step: RecipeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn setup(mut self) -> Self {
        self.is_setup_recipe = true;
        self
    }

    pub fn id(&self) -> String {
        recipe_id(&self.base_path, &self.file_name)
    }

    /// Display name, falling back to the name, then the file name.
    pub fn label(&self) -> &str {
        [&self.display_name, &self.name, &self.file_name]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    pub fn is_hidden(&self) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(HIDDEN_TAG))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeItem {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub base_path: String,
    pub file_name: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

impl From<&RecipeDescriptor> for RecipeItem {
    fn from(recipe: &RecipeDescriptor) -> Self {
        Self {
            id: recipe.id(),
            name: recipe.name.clone(),
            display_name: recipe.label().to_string(),
            description: recipe.description.clone(),
            base_path: recipe.base_path.clone(),
            file_name: recipe.file_name.clone(),
            categories: recipe.categories.clone(),
            tags: recipe.tags.clone(),
        }
    }
}
