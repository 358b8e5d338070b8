// src/config.rs
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CohereConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
    pub max_retry_time: Duration,
}

/// Daily generation limits per user and endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    pub recipe: i64,
    pub recipe_search: i64,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            recipe: 50,
            recipe_search: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database: DatabaseConfig,
    pub cohere: CohereConfig,
    pub limits: UsageLimits,
}

impl AppConfig {
    /// Reads the process environment (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let defaults = UsageLimits::default();

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            database: DatabaseConfig {
                url,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 5)?,
            },
            cohere: CohereConfig {
                api_key: get("COHERE_API_KEY"),
                base_url: get("COHERE_API_URL")
                    .unwrap_or_else(|| "https://api.cohere.com/v2".to_string()),
                model: get("COHERE_MODEL").unwrap_or_else(|| "command-a-03-2025".to_string()),
                request_timeout: Duration::from_secs(parse_or(
                    "LLM_TIMEOUT_SECS",
                    get("LLM_TIMEOUT_SECS"),
                    120,
                )?),
                max_retry_time: Duration::from_secs(parse_or(
                    "LLM_MAX_RETRY_SECS",
                    get("LLM_MAX_RETRY_SECS"),
                    60,
                )?),
            },
            limits: UsageLimits {
                recipe: parse_or("RECIPE_DAILY_LIMIT", get("RECIPE_DAILY_LIMIT"), defaults.recipe)?,
                recipe_search: parse_or(
                    "SEARCH_DAILY_LIMIT",
                    get("SEARCH_DAILY_LIMIT"),
                    defaults.recipe_search,
                )?,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
