// src/services/recipe_generator.rs
use crate::cohere_client::{ChatModel, SamplingParams};
use crate::error::AppError;
use crate::models::recipe::{
    active_filter, CalorieRange, NewRecipeLog, RecipeDocument, RecipeRequest, RecipeSearchRequest,
};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use super::recipe_store::RecipeStore;

lazy_static::lazy_static! {
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").expect("valid object pattern");
    static ref JSON_ARRAY: Regex = Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("valid array pattern");
}

pub const CACHED_PROMPT: &str = "Retrieved from logs";

const SEARCH_TEMPERATURE: f32 = 0.9;
const SEARCH_TOP_P: f32 = 0.75;

/// Widest `{ ... }` span in free text
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

/// Widest `[ { ... } ]` span in free text
pub fn extract_json_array(text: &str) -> Option<&str> {
    JSON_ARRAY.find(text).map(|m| m.as_str())
}

pub fn single_recipe_prompt(ingredients: &str) -> String {
    format!(
        "Suggest a creative recipe using only these ingredients: {}. \
         Respond in this JSON format: {{\
         \"title\": \"Recipe Name\", \
         \"ingredients\": [\"ingredient 1\", \"ingredient 2\", ...], \
         \"steps\": [\"step 1\", \"step 2\", ...(in detail instructions)], \
         \"calories\": \"approximate calories per serving\", \
         \"diet\": \"dietary category (e.g., vegetarian, keto, vegan)\", \
         \"origin\": \"specific geographical origin of the recipe\", \
         \"course\": \"type of meal (e.g., appetizer, main dish, dessert)\", \
         \"cuisine\": \"type of cuisine (e.g., Indian, Italian, Mexican)\"\
         }}",
        ingredients
    )
}

/// Search prompt; `timestamp_ms` makes every request distinct
pub fn search_prompt(
    request: &RecipeSearchRequest,
    calorie_range: CalorieRange,
    timestamp_ms: i64,
) -> String {
    let mut prompt = String::from(
        "Find me 8-10 unique and different recipes (IMPORTANT: ensure variety and avoid repeating recipes from previous requests). ",
    );
    prompt.push_str(&format!("This is request timestamp: {}. ", timestamp_ms));

    if let Some(query) = request.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        prompt.push_str(&format!("Matching the search query: {}. ", query));
    }
    if let Some(diet) = active_filter(request.diet.as_deref()) {
        prompt.push_str(&format!("Recipes should be {}. ", diet));
    }
    if let Some(cuisine) = active_filter(request.cuisine.as_deref()) {
        prompt.push_str(&format!("From {} cuisine. ", cuisine));
    }
    if let Some(course) = active_filter(request.course.as_deref()) {
        prompt.push_str(&format!("For {}. ", course));
    }
    if let Some(phrase) = calorie_range.prompt_phrase() {
        prompt.push_str(phrase);
    }
    if let Some(origin) = active_filter(request.origin.as_deref()) {
        prompt.push_str(&format!("From {} origin. ", origin));
    }

    prompt.push_str("IMPORTANT: Each recipe should be creative and different from one another. ");
    prompt.push_str("Respond with an array of recipe objects in this JSON format: ");
    prompt.push_str(
        "[{\"title\": \"Recipe Name\", \
         \"ingredients\": [\"ingredient 1\", \"ingredient 2\", ...], \
         \"steps\": [\"step 1\", \"step 2\", ...], \
         \"calories\": \"approximate calories per serving\", \
         \"diet\": \"dietary category\", \
         \"origin\": \"geographical origin\", \
         \"course\": \"type of meal\", \
         \"cuisine\": \"type of cuisine\", \
         \"prepTime\": \"preparation time in minutes\", \
         \"cookTime\": \"cooking time in minutes\"}]",
    );
    prompt
}

pub fn search_sampling(timestamp_ms: i64) -> SamplingParams {
    SamplingParams {
        temperature: Some(SEARCH_TEMPERATURE),
        p: Some(SEARCH_TOP_P),
        seed: Some(timestamp_ms.rem_euclid(1_000_000) as u64),
    }
}

/// Result of a single-recipe request that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeOutcome {
    /// Served from an earlier generation with the same ingredients
    Cached(RecipeDocument),
    Generated(RecipeDocument),
    /// The model answered without a recipe object
    NotFound(RecipeDocument),
}

impl RecipeOutcome {
    pub fn into_document(self) -> RecipeDocument {
        match self {
            RecipeOutcome::Cached(doc) | RecipeOutcome::Generated(doc) | RecipeOutcome::NotFound(doc) => doc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<RecipeDocument>),
    /// The model answered without a recipe array
    NoResults(RecipeDocument),
}

#[derive(Clone)]
pub struct RecipeGenerator {
    store: Arc<dyn RecipeStore>,
    model: Option<Arc<dyn ChatModel>>,
}

impl RecipeGenerator {
    pub fn new(store: Arc<dyn RecipeStore>, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { store, model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    fn model(&self) -> Result<&Arc<dyn ChatModel>, AppError> {
        self.model
            .as_ref()
            .ok_or_else(|| AppError::Llm("LLM client not configured".to_string()))
    }

    async fn log(
        &self,
        uid: &str,
        mail: &str,
        prompt: &str,
        ingredients: &str,
        recipe: &RecipeDocument,
    ) -> Result<(), AppError> {
        self.store
            .log_recipe(&NewRecipeLog {
                uid: uid.to_string(),
                mail: mail.to_string(),
                prompt: prompt.to_string(),
                ingredients: ingredients.to_string(),
                result: serde_json::to_string(recipe)?,
            })
            .await?;
        Ok(())
    }

    /// Reuses a logged recipe for the same ingredients, otherwise asks the model
    pub async fn generate(&self, request: &RecipeRequest) -> Result<RecipeOutcome, AppError> {
        if let Some(json) = self.store.find_logged_recipe(&request.ingredients).await? {
            let mut recipe: RecipeDocument = serde_json::from_str(&json)?;
            recipe.fill_defaults();
            self.log(&request.uid, &request.mail, CACHED_PROMPT, &request.ingredients, &recipe)
                .await?;

            tracing::info!(
                uid = %request.uid,
                title = recipe.title().unwrap_or_default(),
                "served recipe from logs"
            );
            return Ok(RecipeOutcome::Cached(recipe));
        }

        let prompt = single_recipe_prompt(&request.ingredients);
        let reply = self
            .model()?
            .chat(&prompt, SamplingParams::default())
            .await
            .map_err(AppError::Llm)?;

        let Some(json) = extract_json_object(&reply) else {
            tracing::warn!(uid = %request.uid, "model reply contained no recipe object");
            return Ok(RecipeOutcome::NotFound(RecipeDocument::not_found()));
        };

        let mut recipe: RecipeDocument = serde_json::from_str(json)?;
        recipe.fill_defaults();
        self.log(&request.uid, &request.mail, &prompt, &request.ingredients, &recipe)
            .await?;

        tracing::info!(
            uid = %request.uid,
            title = recipe.title().unwrap_or_default(),
            "generated new recipe"
        );
        Ok(RecipeOutcome::Generated(recipe))
    }

    /// Asks the model for several recipes and logs each one
    pub async fn search(&self, request: &RecipeSearchRequest) -> Result<SearchOutcome, AppError> {
        let calorie_range = CalorieRange::parse_optional(request.calorie_range.as_deref())
            .map_err(AppError::InvalidRequest)?;

        let timestamp_ms = Utc::now().timestamp_millis();
        let prompt = search_prompt(request, calorie_range, timestamp_ms);
        let reply = self
            .model()?
            .chat(&prompt, search_sampling(timestamp_ms))
            .await
            .map_err(AppError::Llm)?;

        let Some(json) = extract_json_array(&reply) else {
            tracing::warn!(uid = %request.uid, "model reply contained no recipe array");
            return Ok(SearchOutcome::NoResults(RecipeDocument::no_search_results()));
        };

        let mut recipes: Vec<RecipeDocument> = serde_json::from_str(json)?;
        let base_id = Utc::now().timestamp_nanos_opt().unwrap_or(timestamp_ms);
        for (index, recipe) in recipes.iter_mut().enumerate() {
            recipe.fill_defaults();
            recipe.fill_timing_defaults();
            recipe.set("id", Value::from(base_id + index as i64));

            // JSON form keeps search entries out of the single-recipe cache
            let ingredients = serde_json::to_string(&recipe.get("ingredients"))?;
            self.log(&request.uid, &request.mail, &prompt, &ingredients, recipe)
                .await?;
        }

        tracing::info!(uid = %request.uid, count = recipes.len(), "generated recipe search results");
        Ok(SearchOutcome::Found(recipes))
    }
}
