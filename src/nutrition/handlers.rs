use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AddIngredientRequest, NutritionFact, SearchQuery, SubmissionResult};
use super::services;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn nutrition_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/nutrition/ingredients",
            get(list_ingredients).post(add_ingredient),
        )
        .route("/nutrition/ingredients/search", get(search_ingredient))
        .route(
            "/nutrition/ingredients/submit-required",
            post(submit_required),
        )
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<NutritionFact>>, AppError> {
    let lookup = state.nutrition.list_all().await?;
    let message = if lookup.degraded {
        "Using mock data (external API unavailable)"
    } else {
        "Data retrieved successfully"
    };
    Ok(ApiResponse::ok(lookup.data)
        .with_message(message)
        .with_degraded(lookup.degraded))
}

#[instrument(skip(state, query))]
pub async fn search_ingredient(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<ApiResponse<NutritionFact>, AppError> {
    let Query(query) = query?;
    let name = query.validate()?;

    let lookup = state.nutrition.search(&name).await?;
    let fact = lookup.data.ok_or(AppError::NotFound("Ingredient"))?;
    Ok(ApiResponse::ok(fact).with_degraded(lookup.degraded))
}

#[instrument(skip(state, body))]
pub async fn add_ingredient(
    State(state): State<AppState>,
    body: Result<Json<AddIngredientRequest>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<NutritionFact>), AppError> {
    let Json(body) = body?;
    let new = body.validate()?;

    let lookup = state.nutrition.add(&new).await?;
    info!(name = %new.name, degraded = lookup.degraded, "ingredient added");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(lookup.data)
            .with_message("Ingredient added successfully")
            .with_degraded(lookup.degraded),
    ))
}

#[instrument(skip(state))]
pub async fn submit_required(
    State(state): State<AppState>,
) -> ApiResponse<Vec<SubmissionResult>> {
    let results = services::submit_required(&state.nutrition).await;
    ApiResponse::ok(results).with_message("Required ingredients submitted successfully")
}
