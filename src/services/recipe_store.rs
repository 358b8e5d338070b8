// src/services/recipe_store.rs
use crate::error::AppError;
use crate::models::recipe::{
    ingredients_key, DiscoverFilter, NewRecipeLog, NewSavedRecipe, SavedRecipe, DISCOVER_LIMIT,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Persistence for saved recipes and the generation log
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Inserts a recipe, returning the number of rows written
    async fn save(&self, recipe: &NewSavedRecipe) -> Result<u64, AppError>;

    async fn get_by_id(&self, id: i32) -> Result<Option<SavedRecipe>, AppError>;

    /// Recipes of one user, newest first
    async fn list_by_user(&self, uid: &str) -> Result<Vec<SavedRecipe>, AppError>;

    /// True iff a row was removed
    async fn delete(&self, id: i32) -> Result<bool, AppError>;

    /// At most `DISCOVER_LIMIT` recipes matching every active filter, highest id first
    async fn discover(&self, filter: &DiscoverFilter) -> Result<Vec<SavedRecipe>, AppError>;

    /// Stored result of the newest earlier generation for the same ingredient set
    async fn find_logged_recipe(&self, ingredients: &str) -> Result<Option<String>, AppError>;

    async fn log_recipe(&self, entry: &NewRecipeLog) -> Result<i64, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Digits-only calorie text as a number, 0 when there are none
const CALORIE_EXPR: &str =
    "COALESCE(NULLIF(LEFT(REGEXP_REPLACE(calories, '[^0-9]', '', 'g'), 18), '')::BIGINT, 0)";

/// Escapes LIKE wildcards so user input only matches literally
pub fn like_pattern(value: &str) -> String {
    let escaped = value
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Builds the discovery query. Columns come from a fixed list, values are bound.
pub fn discover_query(filter: &DiscoverFilter) -> QueryBuilder<'_, Postgres> {
    let mut query = QueryBuilder::new("SELECT * FROM saved_recipe WHERE 1=1");

    if let Some(condition) = filter.calorie_range.sql_condition() {
        query.push(" AND ");
        query.push(CALORIE_EXPR);
        query.push(" ");
        query.push(condition);
    }

    for (column, value) in filter.text_filters() {
        query.push(format!(" AND LOWER({}) LIKE ", column));
        query.push_bind(like_pattern(value));
    }

    query.push(" ORDER BY id DESC LIMIT ");
    query.push_bind(DISCOVER_LIMIT as i64);
    query
}

#[derive(Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn save(&self, recipe: &NewSavedRecipe) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO saved_recipe (
                uid, mail, prompt, recipe_name, ingredients, steps,
                calories, diet, origin, course, cuisine
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&recipe.uid)
        .bind(&recipe.mail)
        .bind(&recipe.prompt)
        .bind(&recipe.recipe_name)
        .bind(&recipe.ingredients)
        .bind(&recipe.steps)
        .bind(&recipe.calories)
        .bind(&recipe.diet)
        .bind(&recipe.origin)
        .bind(&recipe.course)
        .bind(&recipe.cuisine)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<SavedRecipe>, AppError> {
        let recipe = sqlx::query_as::<_, SavedRecipe>("SELECT * FROM saved_recipe WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(recipe)
    }

    async fn list_by_user(&self, uid: &str) -> Result<Vec<SavedRecipe>, AppError> {
        let recipes = sqlx::query_as::<_, SavedRecipe>(
            "SELECT * FROM saved_recipe WHERE uid = $1 ORDER BY saved_time_date DESC, id DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(recipes)
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM saved_recipe WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn discover(&self, filter: &DiscoverFilter) -> Result<Vec<SavedRecipe>, AppError> {
        let mut query = discover_query(filter);
        let recipes = query
            .build_query_as::<SavedRecipe>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, filter = ?filter, "discovery query failed");
                e
            })?;
        Ok(recipes)
    }

    async fn find_logged_recipe(&self, ingredients: &str) -> Result<Option<String>, AppError> {
        let key = ingredients_key(ingredients);
        if key.is_empty() {
            return Ok(None);
        }

        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT result FROM recipe_logs
            WHERE ingredients_key = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(result,)| result))
    }

    async fn log_recipe(&self, entry: &NewRecipeLog) -> Result<i64, AppError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO recipe_logs (uid, mail, prompt, ingredients, ingredients_key, result)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&entry.uid)
        .bind(&entry.mail)
        .bind(&entry.prompt)
        .bind(&entry.ingredients)
        .bind(ingredients_key(&entry.ingredients))
        .bind(&entry.result)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recipe::CalorieRange;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Veg"), "%veg%");
        assert_eq!(like_pattern("100%_raw"), "%100\\%\\_raw%");
    }

    #[test]
    fn test_discover_query_without_filters() {
        let filter = DiscoverFilter::default();
        let query = discover_query(&filter);
        assert_eq!(
            query.sql(),
            "SELECT * FROM saved_recipe WHERE 1=1 ORDER BY id DESC LIMIT $1"
        );
    }

    #[test]
    fn test_discover_query_composes_predicates() {
        let filter = DiscoverFilter {
            calorie_range: CalorieRange::From300To500,
            diet: Some("vegan".into()),
            cuisine: Some("Thai".into()),
            ..Default::default()
        };
        let query = discover_query(&filter);
        let sql = query.sql();

        assert!(sql.contains("'[^0-9]', '', 'g'"));
        assert!(sql.contains(", 0) BETWEEN 300 AND 500"));
        assert!(sql.contains(" AND LOWER(diet) LIKE $1"));
        assert!(sql.contains(" AND LOWER(cuisine) LIKE $2"));
        assert!(!sql.contains("origin"));
        assert!(sql.ends_with(" ORDER BY id DESC LIMIT $3"));
    }
}
