use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::RecipeRequest;
use super::repo_types::Recipe;
use super::services::{self, BatchRecalculation};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/recalculate-nutrition", post(recalculate_all))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/recalculate-nutrition", post(recalculate_recipe))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Recipe>>, AppError> {
    let recipes = state.recipes.list().await?;
    Ok(ApiResponse::ok(recipes))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    body: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<Recipe>), AppError> {
    let Json(body) = body?;
    let draft = body.into_draft()?;
    let recipe = services::create_recipe(state.recipes.as_ref(), &draft).await?;

    info!(recipe_id = recipe.id, calories = %recipe.total_calories, "recipe created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(recipe).with_message("Recipe created successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Recipe>, AppError> {
    let recipe = state
        .recipes
        .get(id)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;
    Ok(ApiResponse::ok(recipe))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<ApiResponse<Recipe>, AppError> {
    let Json(body) = body?;
    let patch = body.into_patch()?;
    let recipe = services::update_recipe(state.recipes.as_ref(), id, &patch)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;

    info!(recipe_id = id, calories = %recipe.total_calories, "recipe updated");
    Ok(ApiResponse::ok(recipe).with_message("Recipe updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>, AppError> {
    if !state.recipes.delete(id).await? {
        return Err(AppError::NotFound("Recipe"));
    }
    info!(recipe_id = id, "recipe deleted");
    Ok(ApiResponse::message("Recipe deleted successfully"))
}

#[instrument(skip(state))]
pub async fn recalculate_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Recipe>, AppError> {
    let recalculation = services::recalculate_recipe(state.recipes.as_ref(), id)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;
    info!(
        recipe_id = id,
        old_calories = %recalculation.previous.calories,
        new_calories = %recalculation.current.calories,
        "nutrition recalculated"
    );

    let recipe = state
        .recipes
        .get(id)
        .await?
        .ok_or(AppError::NotFound("Recipe"))?;
    Ok(ApiResponse::ok(recipe).with_message("Nutrition recalculated successfully"))
}

#[instrument(skip(state))]
pub async fn recalculate_all(
    State(state): State<AppState>,
) -> Result<ApiResponse<BatchRecalculation>, AppError> {
    let report = services::recalculate_all(state.recipes.as_ref()).await?;
    Ok(ApiResponse::ok(report).with_message("Nutrition recalculated for all recipes"))
}
