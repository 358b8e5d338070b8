// Recipe generation, search and saved-recipe endpoints

use crate::error::{AppError, MessageResponse};
use crate::models::recipe::{
    CalorieRange, DiscoverFilter, DiscoveredRecipe, NewSavedRecipe, RecipeDocument,
    RecipeFilterRequest, RecipeRequest, RecipeSearchRequest, SavedRecipe,
};
use crate::models::usage::{
    EndpointUsage, UsageQuery, UsageResponse, ENDPOINT_RECIPE, ENDPOINT_RECIPE_SEARCH,
};
use crate::services::api_usage::UsageTracker;
use crate::services::recipe_generator::SearchOutcome;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn recipe_routes() -> Router {
    Router::new()
        .route("/recipe", post(generate_recipe))
        .route("/recipe/search", post(search_recipes))
        .route("/recipe/save", post(save_recipe))
        .route("/recipe/discover", post(discover_recipes))
        .route("/recipe/user/:uid", get(list_user_recipes))
        .route("/recipe/usage/:uid", get(get_usage))
        .route("/recipe/:id", get(get_recipe).delete(delete_recipe))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

/// Requests without a uid are anonymous and not metered
async fn enforce_daily_limit(
    state: &AppState,
    uid: &str,
    email: &str,
    endpoint: &str,
    limit: i64,
) -> Result<(), AppError> {
    if uid.trim().is_empty() {
        return Ok(());
    }

    if state.usage.check_and_consume(uid, email, endpoint, limit).await? {
        Ok(())
    } else {
        Err(AppError::UsageLimitExceeded {
            endpoint: endpoint.to_string(),
            limit,
        })
    }
}

async fn generate_recipe(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(payload)?;
    let limit = state.limits.recipe;

    let result = match enforce_daily_limit(&state, &request.uid, &request.mail, ENDPOINT_RECIPE, limit).await {
        Ok(()) => state.generator.generate(&request).await,
        Err(e @ AppError::UsageLimitExceeded { .. }) => return Err(e),
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => Ok(Json(outcome.into_document()).into_response()),
        Err(e) => {
            tracing::error!(uid = %request.uid, error = %e, "recipe generation failed");
            let body = RecipeDocument::generation_error(&e.to_string());
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

async fn search_recipes(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RecipeSearchRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_body(payload)?;
    // reject a bad range before it costs the caller a request
    CalorieRange::parse_optional(request.calorie_range.as_deref())
        .map_err(AppError::InvalidRequest)?;

    let limit = state.limits.recipe_search;
    let result = match enforce_daily_limit(&state, &request.uid, &request.mail, ENDPOINT_RECIPE_SEARCH, limit).await {
        Ok(()) => state.generator.search(&request).await,
        Err(e @ AppError::UsageLimitExceeded { .. }) => return Err(e),
        Err(e) => Err(e),
    };

    match result {
        Ok(SearchOutcome::Found(recipes)) => Ok(Json(recipes).into_response()),
        Ok(SearchOutcome::NoResults(placeholder)) => Ok(Json(vec![placeholder]).into_response()),
        Err(e) => {
            tracing::error!(uid = %request.uid, error = %e, "recipe search failed");
            let body = vec![RecipeDocument::search_error(&e.to_string())];
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

async fn save_recipe(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<NewSavedRecipe>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let recipe = parse_body(payload)?;
    if recipe.uid.trim().is_empty() {
        return Err(AppError::InvalidRequest("uid is required".to_string()));
    }

    state.recipes.save(&recipe).await?;
    tracing::info!(uid = %recipe.uid, recipe_name = %recipe.recipe_name, "recipe saved");

    Ok(Json(MessageResponse::ok("Recipe saved successfully")))
}

async fn discover_recipes(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RecipeFilterRequest>, JsonRejection>,
) -> Result<Json<Vec<DiscoveredRecipe>>, AppError> {
    let filter = DiscoverFilter::try_from(parse_body(payload)?).map_err(AppError::InvalidRequest)?;

    let recipes = state.recipes.discover(&filter).await?;
    tracing::debug!(count = recipes.len(), filter = ?filter, "discovered recipes");

    Ok(Json(recipes.into_iter().map(DiscoveredRecipe::from).collect()))
}

async fn list_user_recipes(
    Extension(state): Extension<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<SavedRecipe>>, AppError> {
    Ok(Json(state.recipes.list_by_user(&uid).await?))
}

async fn get_recipe(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<SavedRecipe>, AppError> {
    state
        .recipes
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))
}

async fn delete_recipe(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.recipes.delete(id).await? {
        return Err(AppError::NotFound("Recipe not found".to_string()));
    }

    tracing::info!(recipe_id = id, "recipe deleted");
    Ok(Json(MessageResponse::ok("Recipe deleted successfully")))
}

async fn get_usage(
    Extension(state): Extension<Arc<AppState>>,
    Path(uid): Path<String>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    let date = UsageTracker::today();
    let mut usage = Vec::with_capacity(2);

    for (endpoint, limit) in [
        (ENDPOINT_RECIPE, state.limits.recipe),
        (ENDPOINT_RECIPE_SEARCH, state.limits.recipe_search),
    ] {
        let count = state.usage.count(&uid, &query.email, endpoint, date).await?;
        usage.push(EndpointUsage {
            endpoint: endpoint.to_string(),
            count,
            limit,
            remaining: (limit - count).max(0),
        });
    }

    Ok(Json(UsageResponse {
        uid,
        email: query.email,
        date,
        usage,
    }))
}
