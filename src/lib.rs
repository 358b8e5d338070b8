// lib.rs - application state and router shared by the binary and the integration tests
pub mod cohere_client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{Extension, Router};
use cohere_client::ChatModel;
use config::UsageLimits;
use services::{RecipeGenerator, RecipeStore, UsageStore, UsageTracker};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub recipes: Arc<dyn RecipeStore>,
    pub usage: UsageTracker,
    pub generator: RecipeGenerator,
    pub limits: UsageLimits,
}

impl AppState {
    pub fn new(
        recipes: Arc<dyn RecipeStore>,
        usage: Arc<dyn UsageStore>,
        chat_model: Option<Arc<dyn ChatModel>>,
        limits: UsageLimits,
    ) -> Self {
        Self {
            generator: RecipeGenerator::new(recipes.clone(), chat_model),
            recipes,
            usage: UsageTracker::new(usage),
            limits,
        }
    }
}

/// Builds the application with all routes and shared state
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::recipe::recipe_routes())
        .merge(handlers::status::status_routes())
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
