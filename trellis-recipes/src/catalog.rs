// Runnable recipe catalog and selection

use crate::descriptor::RecipeDescriptor;
use crate::harvester::RecipeHarvester;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use trellis_core::names::non_blank;
use trellis_core::{ManagementError, Result};

/// Every harvested recipe, de-duplicated by id (first wins).
pub async fn harvest_all(harvesters: &[Arc<dyn RecipeHarvester>]) -> Result<Vec<RecipeDescriptor>> {
    let harvested = join_all(harvesters.iter().map(|h| h.harvest())).await;

    let mut seen = HashSet::new();
    let mut recipes = Vec::new();
    for batch in harvested {
        for recipe in batch? {
            if seen.insert(recipe.id().to_lowercase()) {
                recipes.push(recipe);
            }
        }
    }
    Ok(recipes)
}

/// Recipes that can be executed on demand: not setup recipes, not hidden,
/// ordered by label then file name.
pub async fn runnable_recipes(
    harvesters: &[Arc<dyn RecipeHarvester>],
) -> Result<Vec<RecipeDescriptor>> {
    let mut recipes: Vec<_> = harvest_all(harvesters)
        .await?
        .into_iter()
        .filter(|r| !r.is_setup_recipe && !r.is_hidden())
        .collect();
    recipes.sort_by(|a, b| {
        a.label()
            .to_lowercase()
            .cmp(&b.label().to_lowercase())
            .then_with(|| a.file_name.to_lowercase().cmp(&b.file_name.to_lowercase()))
    });
    Ok(recipes)
}

/// Setup recipe with the given name.
pub async fn find_setup_recipe(
    harvesters: &[Arc<dyn RecipeHarvester>],
    name: &str,
) -> Result<RecipeDescriptor> {
    harvest_all(harvesters)
        .await?
        .into_iter()
        .find(|r| r.is_setup_recipe && r.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| {
            ManagementError::not_found(format!("Setup recipe '{}' was not found.", name.trim()))
        })
}

#[derive(Debug, Clone, Default)]
pub struct RecipeSelector {
    pub recipe_id: Option<String>,
    pub recipe_name: Option<String>,
    pub file_name: Option<String>,
}

fn single<'a>(
    matches: Vec<&'a RecipeDescriptor>,
    kind: &str,
    value: &str,
) -> Result<&'a RecipeDescriptor> {
    match matches.as_slice() {
        [] => Err(ManagementError::not_found(format!(
            "{} '{}' was not found.",
            kind, value
        ))),
        [recipe] => Ok(*recipe),
        candidates => Err(ManagementError::conflict(format!(
            "{} '{}' is ambiguous. Use recipeId instead.",
            kind, value
        ))
        .with_detail(
            "candidates",
            candidates.iter().map(|r| r.id()).collect::<Vec<_>>(),
        )),
    }
}

/// Pick one recipe: first usable selector of id, name, file name.
pub fn match_recipe<'a>(
    recipes: &'a [RecipeDescriptor],
    selector: &RecipeSelector,
) -> Result<&'a RecipeDescriptor> {
    if recipes.is_empty() {
        return Err(ManagementError::not_found(
            "No runnable recipes were found in current tenant scope.",
        ));
    }

    if let Some(id) = non_blank(selector.recipe_id.as_deref()) {
        return recipes
            .iter()
            .find(|r| r.id().eq_ignore_ascii_case(&id))
            .ok_or_else(|| ManagementError::not_found(format!("Recipe '{}' was not found.", id)));
    }

    if let Some(name) = non_blank(selector.recipe_name.as_deref()) {
        let matches = recipes
            .iter()
            .filter(|r| r.name.trim().eq_ignore_ascii_case(&name))
            .collect();
        return single(matches, "Recipe name", &name);
    }

    if let Some(file_name) = non_blank(selector.file_name.as_deref()) {
        let matches = recipes
            .iter()
            .filter(|r| r.file_name.trim().eq_ignore_ascii_case(&file_name))
            .collect();
        return single(matches, "Recipe file", &file_name);
    }

    Err(ManagementError::invalid(
        "RecipeId, RecipeName or FileName is required.",
    ))
}
