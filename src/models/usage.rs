// src/models/usage.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Endpoint key for single recipe generation
pub const ENDPOINT_RECIPE: &str = "recipe";
/// Endpoint key for multi recipe search
pub const ENDPOINT_RECIPE_SEARCH: &str = "recipe_search";

/// One row of `api_usage_logs`: requests made by a user against an
/// endpoint on a given day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ApiUsageRecord {
    pub user_id: String,
    pub email: String,
    pub endpoint: String,
    pub usage_date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsageQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EndpointUsage {
    pub endpoint: String,
    pub count: i64,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub uid: String,
    pub email: String,
    pub date: NaiveDate,
    pub usage: Vec<EndpointUsage>,
}
