//! Store tests against a real PostgreSQL database.
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.
//! Every test scopes its rows with a fresh uuid so runs can share a database.

use recipe_suggest::config::DatabaseConfig;
use recipe_suggest::db;
use recipe_suggest::models::recipe::{
    extract_calories, CalorieRange, DiscoverFilter, NewRecipeLog, NewSavedRecipe,
};
use recipe_suggest::services::{PgRecipeStore, PgUsageStore, RecipeStore, UsageStore, UsageTracker};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

async fn test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run PostgreSQL tests");

    db::create_pool(&DatabaseConfig {
        url,
        max_connections: 5,
    })
    .await
    .expect("Failed to connect to test database")
}

fn recipe(uid: &str, name: &str, calories: &str, diet: &str, course: &str, cuisine: &str) -> NewSavedRecipe {
    NewSavedRecipe {
        uid: uid.to_string(),
        mail: format!("{}@example.com", uid),
        prompt: Some("tomato, egg".to_string()),
        recipe_name: name.to_string(),
        ingredients: "tomato, egg".to_string(),
        steps: "Cook it".to_string(),
        calories: calories.to_string(),
        diet: diet.to_string(),
        origin: "Spain".to_string(),
        course: course.to_string(),
        cuisine: cuisine.to_string(),
    }
}

fn names(recipes: &[recipe_suggest::models::recipe::SavedRecipe]) -> Vec<String> {
    recipes.iter().map(|r| r.recipe_name.clone()).collect()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn save_get_delete_round_trip() {
    let store = PgRecipeStore::new(test_pool().await);
    let uid = Uuid::new_v4().to_string();
    let input = recipe(&uid, "Tortilla", "350 kcal", "Vegetarian", "Main", "Spanish");

    assert_eq!(store.save(&input).await.unwrap(), 1);

    let listed = store.list_by_user(&uid).await.unwrap();
    assert_eq!(listed.len(), 1);
    let fetched = store.get_by_id(listed[0].id).await.unwrap().unwrap();
    assert_eq!(fetched, input.into_saved(fetched.id, fetched.saved_time_date));

    assert!(store.delete(fetched.id).await.unwrap());
    assert!(store.get_by_id(fetched.id).await.unwrap().is_none());
    assert!(!store.delete(fetched.id).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn discover_extracts_calories_from_text() {
    let store = PgRecipeStore::new(test_pool().await);
    let tag = format!("cuisine-{}", Uuid::new_v4());

    for (name, calories) in [
        ("Salad", "250 kcal"),
        ("Curry", "650 kcal"),
        ("Pct", "100"),
        ("Feast", "approx. 1,200 calories"),
        ("Mystery", "unknown"),
    ] {
        store.save(&recipe("u1", name, calories, "", "", &tag)).await.unwrap();
    }

    let under300 = DiscoverFilter {
        calorie_range: CalorieRange::Under300,
        cuisine: Some(tag.clone()),
        ..Default::default()
    };
    let low = store.discover(&under300).await.unwrap();
    assert_eq!(names(&low), vec!["Mystery", "Pct", "Salad"]);
    assert!(low.iter().all(|r| extract_calories(&r.calories) < 300));

    let over800 = DiscoverFilter {
        calorie_range: CalorieRange::Over800,
        cuisine: Some(tag.clone()),
        ..Default::default()
    };
    assert_eq!(names(&store.discover(&over800).await.unwrap()), vec!["Feast"]);

    let any = DiscoverFilter {
        cuisine: Some(tag.to_uppercase()),
        ..Default::default()
    };
    assert_eq!(store.discover(&any).await.unwrap().len(), 5);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn discover_filters_intersect() {
    let store = PgRecipeStore::new(test_pool().await);
    let tag = format!("cuisine-{}", Uuid::new_v4());

    for (name, diet, course) in [
        ("Hummus", "Vegan", "Starter"),
        ("Chili", "Vegan", "Main dish"),
        ("Steak", "Keto", "Main dish"),
        ("Gazpacho", "vegan", "starter"),
    ] {
        store.save(&recipe("u1", name, "100", diet, course, &tag)).await.unwrap();
    }

    let filter = |diet: Option<&str>, course: Option<&str>| DiscoverFilter {
        diet: diet.map(str::to_string),
        course: course.map(str::to_string),
        cuisine: Some(tag.clone()),
        ..Default::default()
    };

    let vegan = names(&store.discover(&filter(Some("VEGAN"), None)).await.unwrap());
    let starters = names(&store.discover(&filter(None, Some("Starter"))).await.unwrap());
    let both = names(&store.discover(&filter(Some("VEGAN"), Some("Starter"))).await.unwrap());

    let intersection: Vec<String> = vegan.iter().filter(|n| starters.contains(n)).cloned().collect();
    assert_eq!(both, intersection);
    assert_eq!(both, vec!["Gazpacho", "Hummus"]);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn discover_matches_wildcards_literally() {
    let store = PgRecipeStore::new(test_pool().await);
    let tag = format!("cuisine-{}", Uuid::new_v4());

    for diet in ["100%_raw", "100 raw", "100xxraw"] {
        store.save(&recipe("u1", diet, "100", diet, "", &tag)).await.unwrap();
    }

    for needle in ["%", "_", "0%_r"] {
        let filter = DiscoverFilter {
            diet: Some(needle.to_string()),
            cuisine: Some(tag.clone()),
            ..Default::default()
        };
        let found = store.discover(&filter).await.unwrap();
        assert_eq!(names(&found), vec!["100%_raw"], "filter {:?}", needle);
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn logged_recipe_lookup_returns_newest_only() {
    let store = PgRecipeStore::new(test_pool().await);
    let marker = Uuid::new_v4().to_string();

    for title in ["first", "second", "third"] {
        store
            .log_recipe(&NewRecipeLog {
                uid: "u1".to_string(),
                mail: String::new(),
                prompt: "p".to_string(),
                ingredients: format!("Egg, {}", marker),
                result: format!(r#"{{"title":"{}"}}"#, title),
            })
            .await
            .unwrap();
    }

    let hit = store
        .find_logged_recipe(&format!("{} ; egg", marker.to_uppercase()))
        .await
        .unwrap();
    assert_eq!(hit.as_deref(), Some(r#"{"title":"third"}"#));
    assert!(store.find_logged_recipe(&marker).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn usage_increment_upserts() {
    let store = PgUsageStore::new(test_pool().await);
    let uid = Uuid::new_v4().to_string();
    let today = UsageTracker::today();

    assert_eq!(store.count(&uid, "a@b.c", "recipe", today).await.unwrap(), 0);
    assert_eq!(store.increment(&uid, "a@b.c", "recipe", today).await.unwrap(), 1);
    assert_eq!(store.increment(&uid, "a@b.c", "recipe", today).await.unwrap(), 2);
    assert_eq!(store.count(&uid, "a@b.c", "recipe", today).await.unwrap(), 2);
    assert_eq!(store.count(&uid, "a@b.c", "recipe_search", today).await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn zero_limit_denies_without_creating_a_row() {
    let store = PgUsageStore::new(test_pool().await);
    let uid = Uuid::new_v4().to_string();
    let today = UsageTracker::today();

    assert!(!store.try_consume(&uid, "", "recipe", today, 0).await.unwrap());
    assert!(store.fetch_record(&uid, "", "recipe", today).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn concurrent_consumers_stop_at_limit() {
    let store = Arc::new(PgUsageStore::new(test_pool().await));
    let uid = Uuid::new_v4().to_string();
    let today = UsageTracker::today();

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let store = store.clone();
            let uid = uid.clone();
            tokio::spawn(async move { store.try_consume(&uid, "a@b.c", "recipe", today, 10).await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 10);
    assert_eq!(store.count(&uid, "a@b.c", "recipe", today).await.unwrap(), 10);
}
