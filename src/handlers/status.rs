use crate::AppState;
use axum::{extract::Extension, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let db_status = match state.recipes.health_check().await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "storage health check failed");
            "unhealthy"
        }
    };

    let llm_status = if state.generator.is_configured() {
        "configured"
    } else {
        "not_configured"
    };

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status,
            "llm": llm_status
        },
        "limits": {
            "recipe": state.limits.recipe,
            "recipe_search": state.limits.recipe_search
        }
    }))
}
