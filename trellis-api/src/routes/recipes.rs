//! Recipe catalog and on-demand execution.

use super::TenantQuery;
use crate::error::{ApiResult, Payload};
use crate::pipeline::Caller;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use trellis_recipes::{ExecuteRecipeRequest, RecipeExecution, RecipeItem, RecipeService};
use trellis_tenancy::ContextProvider;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/execute", post(execute_recipe))
}

pub async fn list_recipes(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<RecipeItem>>> {
    let recipes = state
        .executor
        .execute(&caller, query.tenant.as_deref(), |ctx| async move {
            ctx.resolve::<RecipeService>()?.list().await
        })
        .await?;
    Ok(Json(recipes))
}

pub async fn execute_recipe(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Payload(request): Payload<ExecuteRecipeRequest>,
) -> ApiResult<Json<RecipeExecution>> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let target = request.tenant.clone();
    let execution = state
        .executor
        .execute(&caller, target.as_deref(), move |ctx| async move {
            ctx.resolve::<RecipeService>()?
                .execute(&request, &cancel)
                .await
        })
        .await?;

    if execution.released_shell_context {
        state.contexts().evict(&execution.tenant);
    }
    info!(
        tenant = %execution.tenant,
        recipe = %execution.recipe_id,
        execution = %execution.execution_id,
        "Recipe executed"
    );
    Ok(Json(execution))
}
