// In-process stores with the same semantics as the PostgreSQL ones.
// Used by the test suites and for running the API without a database.

use super::api_usage::UsageStore;
use super::recipe_store::RecipeStore;
use crate::error::AppError;
use crate::models::recipe::{
    ingredients_key, DiscoverFilter, NewRecipeLog, NewSavedRecipe, RecipeLogEntry, SavedRecipe,
    DISCOVER_LIMIT,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct RecipeTables {
    next_recipe_id: i32,
    next_log_id: i64,
    recipes: Vec<SavedRecipe>,
    logs: Vec<RecipeLogEntry>,
}

#[derive(Default)]
pub struct MemoryRecipeStore {
    tables: RwLock<RecipeTables>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the generation log, oldest first
    pub async fn logs(&self) -> Vec<RecipeLogEntry> {
        self.tables.read().await.logs.clone()
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn save(&self, recipe: &NewSavedRecipe) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        tables.next_recipe_id += 1;
        let id = tables.next_recipe_id;
        tables.recipes.push(recipe.clone().into_saved(id, Utc::now()));
        Ok(1)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<SavedRecipe>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn list_by_user(&self, uid: &str) -> Result<Vec<SavedRecipe>, AppError> {
        let tables = self.tables.read().await;
        let mut recipes: Vec<SavedRecipe> = tables
            .recipes
            .iter()
            .filter(|r| r.uid == uid)
            .cloned()
            .collect();
        recipes.sort_by(|a, b| {
            b.saved_time_date
                .cmp(&a.saved_time_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(recipes)
    }

    async fn delete(&self, id: i32) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.recipes.len();
        tables.recipes.retain(|r| r.id != id);
        Ok(tables.recipes.len() < before)
    }

    async fn discover(&self, filter: &DiscoverFilter) -> Result<Vec<SavedRecipe>, AppError> {
        let tables = self.tables.read().await;
        let mut recipes: Vec<SavedRecipe> = tables
            .recipes
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        recipes.sort_by(|a, b| b.id.cmp(&a.id));
        recipes.truncate(DISCOVER_LIMIT);
        Ok(recipes)
    }

    async fn find_logged_recipe(&self, ingredients: &str) -> Result<Option<String>, AppError> {
        let key = ingredients_key(ingredients);
        if key.is_empty() {
            return Ok(None);
        }

        let tables = self.tables.read().await;
        Ok(tables
            .logs
            .iter()
            .rev()
            .find(|entry| entry.ingredients_key == key)
            .map(|entry| entry.result.clone()))
    }

    async fn log_recipe(&self, entry: &NewRecipeLog) -> Result<i64, AppError> {
        let mut tables = self.tables.write().await;
        tables.next_log_id += 1;
        let id = tables.next_log_id;
        tables.logs.push(RecipeLogEntry {
            id,
            uid: entry.uid.clone(),
            mail: entry.mail.clone(),
            prompt: entry.prompt.clone(),
            ingredients: entry.ingredients.clone(),
            ingredients_key: ingredients_key(&entry.ingredients),
            result: entry.result.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

type UsageKey = (String, String, String, NaiveDate);

#[derive(Default)]
pub struct MemoryUsageStore {
    counters: RwLock<HashMap<UsageKey, i64>>,
}

fn usage_key(uid: &str, email: &str, endpoint: &str, date: NaiveDate) -> UsageKey {
    (uid.to_string(), email.to_string(), endpoint.to_string(), date)
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn count(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        let counters = self.counters.read().await;
        Ok(counters
            .get(&usage_key(uid, email, endpoint, date))
            .copied()
            .unwrap_or(0))
    }

    async fn increment(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        let mut counters = self.counters.write().await;
        let count = counters
            .entry(usage_key(uid, email, endpoint, date))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn try_consume(
        &self,
        uid: &str,
        email: &str,
        endpoint: &str,
        date: NaiveDate,
        limit: i64,
    ) -> Result<bool, AppError> {
        let mut counters = self.counters.write().await;
        let key = usage_key(uid, email, endpoint, date);
        let current = counters.get(&key).copied().unwrap_or(0);
        if current >= limit {
            return Ok(false);
        }
        counters.insert(key, current + 1);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recipe::{extract_calories, CalorieRange};

    fn new_recipe(uid: &str, name: &str, calories: &str, diet: &str, cuisine: &str) -> NewSavedRecipe {
        NewSavedRecipe {
            uid: uid.into(),
            mail: format!("{}@example.com", uid),
            prompt: Some("tomato, egg".into()),
            recipe_name: name.into(),
            ingredients: "tomato, egg".into(),
            steps: "Cook it".into(),
            calories: calories.into(),
            diet: diet.into(),
            origin: "Spain".into(),
            course: "Main dish".into(),
            cuisine: cuisine.into(),
        }
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips_fields() {
        let store = MemoryRecipeStore::new();
        let input = new_recipe("u1", "Tortilla", "350 kcal", "Vegetarian", "Spanish");

        assert_eq!(store.save(&input).await.unwrap(), 1);
        let listed = store.list_by_user("u1").await.unwrap();
        let fetched = store.get_by_id(listed[0].id).await.unwrap().unwrap();

        let expected = input.into_saved(fetched.id, fetched.saved_time_date);
        assert_eq!(fetched, expected);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryRecipeStore::new();
        store.save(&new_recipe("u1", "A", "100", "", "")).await.unwrap();

        assert!(!store.delete(99).await.unwrap());
        assert!(store.delete(1).await.unwrap());
        assert!(store.get_by_id(1).await.unwrap().is_none());
        assert!(!store.delete(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let store = MemoryRecipeStore::new();
        store.save(&new_recipe("u1", "First", "1", "", "")).await.unwrap();
        store.save(&new_recipe("u2", "Other", "1", "", "")).await.unwrap();
        store.save(&new_recipe("u1", "Second", "1", "", "")).await.unwrap();

        let names: Vec<String> = store
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.recipe_name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_discover_filters_intersect() {
        let store = MemoryRecipeStore::new();
        store.save(&new_recipe("u1", "Salad", "250 kcal", "Vegan", "Greek")).await.unwrap();
        store.save(&new_recipe("u1", "Curry", "650 kcal", "Vegan", "Indian")).await.unwrap();
        store.save(&new_recipe("u1", "Steak", "900", "Keto", "American")).await.unwrap();
        store.save(&new_recipe("u1", "Mystery", "unknown", "vegan", "Greek")).await.unwrap();

        let under300 = DiscoverFilter {
            calorie_range: CalorieRange::Under300,
            ..Default::default()
        };
        let low = store.discover(&under300).await.unwrap();
        assert!(low.iter().all(|r| extract_calories(&r.calories) < 300));
        assert_eq!(low.len(), 2);

        let vegan = DiscoverFilter {
            diet: Some("VEGAN".into()),
            ..Default::default()
        };
        let greek = DiscoverFilter {
            cuisine: Some("greek".into()),
            ..Default::default()
        };
        let both = DiscoverFilter {
            diet: Some("VEGAN".into()),
            cuisine: Some("greek".into()),
            ..Default::default()
        };

        let vegan_ids: Vec<i32> = store.discover(&vegan).await.unwrap().iter().map(|r| r.id).collect();
        let greek_ids: Vec<i32> = store.discover(&greek).await.unwrap().iter().map(|r| r.id).collect();
        let both_ids: Vec<i32> = store.discover(&both).await.unwrap().iter().map(|r| r.id).collect();
        let intersection: Vec<i32> = vegan_ids
            .iter()
            .copied()
            .filter(|id| greek_ids.contains(id))
            .collect();

        assert_eq!(both_ids, intersection);
        assert_eq!(both_ids, vec![4, 1]);

        let all = store.discover(&DiscoverFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_discover_is_capped() {
        let store = MemoryRecipeStore::new();
        for i in 0..60 {
            store
                .save(&new_recipe("u1", &format!("R{}", i), "100", "", ""))
                .await
                .unwrap();
        }

        let found = store.discover(&DiscoverFilter::default()).await.unwrap();
        assert_eq!(found.len(), DISCOVER_LIMIT);
        assert_eq!(found[0].id, 60);
    }

    #[tokio::test]
    async fn test_logged_recipe_is_newest_match() {
        let store = MemoryRecipeStore::new();
        store
            .log_recipe(&NewRecipeLog {
                uid: "u1".into(),
                mail: "".into(),
                prompt: "p".into(),
                ingredients: "Egg, Tomato".into(),
                result: r#"{"title":"Shakshuka"}"#.into(),
            })
            .await
            .unwrap();

        store
            .log_recipe(&NewRecipeLog {
                uid: "u2".into(),
                mail: "".into(),
                prompt: "p".into(),
                ingredients: "tomato; egg".into(),
                result: r#"{"title":"Menemen"}"#.into(),
            })
            .await
            .unwrap();

        let hit = store.find_logged_recipe("tomato ,egg").await.unwrap();
        assert_eq!(hit.as_deref(), Some(r#"{"title":"Menemen"}"#));
        assert!(store.find_logged_recipe("tomato").await.unwrap().is_none());
        assert!(store.find_logged_recipe("").await.unwrap().is_none());
    }
}
