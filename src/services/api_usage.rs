// Per-user daily usage counters for the generation endpoints.
// Each (user, email, endpoint, day) key has at most one row; a missing row means zero.

use crate::error::AppError;
use crate::models::usage::ApiUsageRecord;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use sqlx::PgPool;
use std::sync::Arc;

#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn count(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError>;

    /// Adds one to the counter, creating it if needed, and returns the new value
    async fn increment(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError>;

    /// Increments only while the counter is below `limit`; false means denied
    async fn try_consume(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
        limit: i64,
    ) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn fetch_record(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<Option<ApiUsageRecord>, sqlx::Error> {
        sqlx::query_as::<_, ApiUsageRecord>(
            r#"
            SELECT user_id, email, endpoint, usage_date, count
            FROM api_usage_logs
            WHERE user_id = $1 AND email = $2 AND endpoint = $3 AND usage_date = $4
            "#,
        )
        .bind(uid)
        .bind(email)
        .bind(endpoint)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn count(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        let record = self.fetch_record(uid, email, endpoint, date).await?;
        Ok(record.map(|r| r.count).unwrap_or(0))
    }

    async fn increment(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO api_usage_logs (user_id, email, endpoint, usage_date, count)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (user_id, email, endpoint, usage_date)
            DO UPDATE SET count = api_usage_logs.count + 1
            RETURNING count
            "#,
        )
        .bind(uid)
        .bind(email)
        .bind(endpoint)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn try_consume(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
        limit: i64,
    ) -> Result<bool, AppError> {
        // A single statement, so two callers can never both take the last slot
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO api_usage_logs (user_id, email, endpoint, usage_date, count)
            SELECT $1, $2, $3, $4, 1
            WHERE $5::BIGINT > 0
            ON CONFLICT (user_id, email, endpoint, usage_date)
            DO UPDATE SET count = api_usage_logs.count + 1
            WHERE api_usage_logs.count < $5::BIGINT
            RETURNING count
            "#,
        )
        .bind(uid)
        .bind(email)
        .bind(endpoint)
        .bind(date)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

/// Daily rate limiting on top of a `UsageStore`, keyed by the server-local date
#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub async fn count(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        self.store.count(uid, email, endpoint, date).await
    }

    pub async fn increment(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        self.store.increment(uid, email, endpoint, date).await
    }

    /// Allows and records one request unless today's count already reached `limit`
    pub async fn check_and_consume(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        limit: i64,
    ) -> Result<bool, AppError> {
        let allowed = self
            .store
            .try_consume(uid, email, endpoint, Self::today(), limit)
            .await?;

        if !allowed {
            tracing::info!(uid = %uid, endpoint = %endpoint, limit, "daily usage limit reached");
        }
        Ok(allowed)
    }

    /// Records one request without checking any limit
    pub async fn track(&self, uid: &str, email: &str, endpoint: &str) -> Result<i64, AppError> {
        self.store.increment(uid, email, endpoint, Self::today()).await
    }
}
