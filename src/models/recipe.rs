// src/models/recipe.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Placeholder value for missing calorie information
pub const NOT_AVAILABLE: &str = "Not available";
/// Placeholder value for missing categorical tags
pub const NOT_SPECIFIED: &str = "Not specified";
/// Sentinel a client sends to disable a filter
pub const ANY: &str = "any";

/// A recipe a user saved, as stored in `saved_recipe`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecipe {
    pub id: i32,
    pub uid: String,
    pub mail: String,
    pub prompt: Option<String>,
    pub recipe_name: String,
    pub ingredients: String,
    pub steps: String,
    pub calories: String,
    pub diet: String,
    pub origin: String,
    pub course: String,
    pub cuisine: String,
    pub saved_time_date: DateTime<Utc>,
}

/// Insert payload for `saved_recipe`; also the body of `POST /recipe/save`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSavedRecipe {
    pub uid: String,
    pub mail: String,
    pub prompt: Option<String>,
    pub recipe_name: String,
    pub ingredients: String,
    pub steps: String,
    pub calories: String,
    pub diet: String,
    pub origin: String,
    pub course: String,
    pub cuisine: String,
}

impl NewSavedRecipe {
    pub fn into_saved(self, id: i32, saved_time_date: DateTime<Utc>) -> SavedRecipe {
        SavedRecipe {
            id,
            uid: self.uid,
            mail: self.mail,
            prompt: self.prompt,
            recipe_name: self.recipe_name,
            ingredients: self.ingredients,
            steps: self.steps,
            calories: self.calories,
            diet: self.diet,
            origin: self.origin,
            course: self.course,
            cuisine: self.cuisine,
            saved_time_date,
        }
    }
}

/// Card shape returned by `POST /recipe/discover`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredRecipe {
    pub id: i32,
    pub title: String,
    pub calories: String,
    pub diet: String,
    pub origin: String,
    pub course: String,
    pub cuisine: String,
    pub ingredients: String,
    pub prep_time: i64,
    pub cook_time: i64,
    pub image_url: Option<String>,
}

impl From<SavedRecipe> for DiscoveredRecipe {
    fn from(recipe: SavedRecipe) -> Self {
        DiscoveredRecipe {
            id: recipe.id,
            title: recipe.recipe_name,
            calories: recipe.calories,
            diet: recipe.diet,
            origin: recipe.origin,
            course: recipe.course,
            cuisine: recipe.cuisine,
            ingredients: recipe.ingredients,
            prep_time: DEFAULT_PREP_TIME,
            cook_time: DEFAULT_COOK_TIME,
            image_url: None,
        }
    }
}

pub const DEFAULT_PREP_TIME: i64 = 30;
pub const DEFAULT_COOK_TIME: i64 = 45;

/// Log of every recipe served by the generation endpoints
#[derive(Debug, Clone)]
pub struct RecipeLogEntry {
    pub id: i64,
    pub uid: String,
    pub mail: String,
    pub prompt: String,
    pub ingredients: String,
    pub ingredients_key: String,
    pub result: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecipeLog {
    pub uid: String,
    pub mail: String,
    pub prompt: String,
    pub ingredients: String,
    pub result: String,
}

/// Canonical form of an ingredient list used to match prior generations.
/// Order, case, whitespace and duplicates do not matter.
pub fn ingredients_key(ingredients: &str) -> String {
    ingredients
        .split(|c: char| c == ',' || c == ';' || c == '\n')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",")
}

/// Numeric calorie value of free text: every non-digit is dropped and an
/// empty remainder counts as 0. Only the first 18 digits are kept so the
/// value always fits in a BIGINT.
pub fn extract_calories(calories: &str) -> i64 {
    let digits: String = calories
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(18)
        .collect();
    digits.parse().unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CalorieRange {
    #[default]
    Any,
    Under300,
    From300To500,
    From500To800,
    Over800,
}

impl CalorieRange {
    /// Parses an optional request value; absent means `Any`
    pub fn parse_optional(value: Option<&str>) -> Result<Self, String> {
        match value.map(str::trim) {
            None | Some("") => Ok(CalorieRange::Any),
            Some(raw) => raw.parse(),
        }
    }

    pub fn contains(&self, calories: i64) -> bool {
        match self {
            CalorieRange::Any => true,
            CalorieRange::Under300 => calories < 300,
            CalorieRange::From300To500 => (300..=500).contains(&calories),
            CalorieRange::From500To800 => (500..=800).contains(&calories),
            CalorieRange::Over800 => calories > 800,
        }
    }

    /// SQL comparison applied to the extracted calorie value
    pub fn sql_condition(&self) -> Option<&'static str> {
        match self {
            CalorieRange::Any => None,
            CalorieRange::Under300 => Some("< 300"),
            CalorieRange::From300To500 => Some("BETWEEN 300 AND 500"),
            CalorieRange::From500To800 => Some("BETWEEN 500 AND 800"),
            CalorieRange::Over800 => Some("> 800"),
        }
    }

    /// Sentence appended to the search prompt
    pub fn prompt_phrase(&self) -> Option<&'static str> {
        match self {
            CalorieRange::Any => None,
            CalorieRange::Under300 => Some("Under 300 calories. "),
            CalorieRange::From300To500 => Some("Between 300-500 calories. "),
            CalorieRange::From500To800 => Some("Between 500-800 calories. "),
            CalorieRange::Over800 => Some("Over 800 calories. "),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalorieRange::Any => ANY,
            CalorieRange::Under300 => "under300",
            CalorieRange::From300To500 => "300-500",
            CalorieRange::From500To800 => "500-800",
            CalorieRange::Over800 => "over800",
        }
    }
}

impl FromStr for CalorieRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(CalorieRange::Any),
            "under300" => Ok(CalorieRange::Under300),
            "300-500" => Ok(CalorieRange::From300To500),
            "500-800" => Ok(CalorieRange::From500To800),
            "over800" => Ok(CalorieRange::Over800),
            other => Err(format!(
                "unknown calorie range '{}', expected one of any, under300, 300-500, 500-800, over800",
                other
            )),
        }
    }
}

impl fmt::Display for CalorieRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the filter value unless it is absent, blank or "any"
pub fn active_filter(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(ANY))
        .map(str::to_string)
}

/// Body of `POST /recipe/discover`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeFilterRequest {
    pub calorie_range: Option<String>,
    pub diet: Option<String>,
    pub origin: Option<String>,
    pub course: Option<String>,
    pub cuisine: Option<String>,
}

/// Validated discovery filter; `None` fields are not applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverFilter {
    pub calorie_range: CalorieRange,
    pub diet: Option<String>,
    pub origin: Option<String>,
    pub course: Option<String>,
    pub cuisine: Option<String>,
}

pub const DISCOVER_LIMIT: usize = 50;

impl DiscoverFilter {
    /// Active text filters paired with the column they apply to
    pub fn text_filters(&self) -> Vec<(&'static str, &str)> {
        [
            ("diet", &self.diet),
            ("origin", &self.origin),
            ("course", &self.course),
            ("cuisine", &self.cuisine),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }

    pub fn matches(&self, recipe: &SavedRecipe) -> bool {
        if !self.calorie_range.contains(extract_calories(&recipe.calories)) {
            return false;
        }

        self.text_filters().into_iter().all(|(column, value)| {
            let field = match column {
                "diet" => &recipe.diet,
                "origin" => &recipe.origin,
                "course" => &recipe.course,
                _ => &recipe.cuisine,
            };
            field.to_lowercase().contains(&value.to_lowercase())
        })
    }
}

impl TryFrom<RecipeFilterRequest> for DiscoverFilter {
    type Error = String;

    fn try_from(request: RecipeFilterRequest) -> Result<Self, Self::Error> {
        Ok(DiscoverFilter {
            calorie_range: CalorieRange::parse_optional(request.calorie_range.as_deref())?,
            diet: active_filter(request.diet.as_deref()),
            origin: active_filter(request.origin.as_deref()),
            course: active_filter(request.course.as_deref()),
            cuisine: active_filter(request.cuisine.as_deref()),
        })
    }
}

/// Body of `POST /recipe`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeRequest {
    pub uid: String,
    pub mail: String,
    pub ingredients: String,
}

/// Body of `POST /recipe/search`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeSearchRequest {
    pub uid: String,
    pub mail: String,
    pub query: Option<String>,
    pub diet: Option<String>,
    pub cuisine: Option<String>,
    pub course: Option<String>,
    pub calorie_range: Option<String>,
    pub origin: Option<String>,
}

/// Recipe JSON exchanged with the model and the web client. Kept as an open
/// object so fields the model adds on its own survive the round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeDocument(pub Map<String, Value>);

impl RecipeDocument {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    /// Fills the categorical fields the client always renders
    pub fn fill_defaults(&mut self) {
        self.0
            .entry("calories")
            .or_insert_with(|| Value::from(NOT_AVAILABLE));
        for key in ["diet", "origin", "course", "cuisine"] {
            self.0
                .entry(key)
                .or_insert_with(|| Value::from(NOT_SPECIFIED));
        }
    }

    /// Search results additionally carry timing fields
    pub fn fill_timing_defaults(&mut self) {
        self.0
            .entry("prepTime")
            .or_insert_with(|| Value::from(DEFAULT_PREP_TIME));
        self.0
            .entry("cookTime")
            .or_insert_with(|| Value::from(DEFAULT_COOK_TIME));
    }

    fn placeholder(title: &str, ingredients: Vec<&str>, step: String) -> Self {
        let mut doc = RecipeDocument::default();
        doc.set("title", Value::from(title));
        doc.set("ingredients", json!(ingredients));
        doc.set("steps", json!([step]));
        doc.fill_defaults();
        doc
    }

    /// Served when the model reply holds no recipe object
    pub fn not_found() -> Self {
        Self::placeholder(
            "Recipe Not Found",
            vec![],
            "Sorry, I couldn't generate a recipe.".to_string(),
        )
    }

    /// Served alongside a 500 when generation fails
    pub fn generation_error(message: &str) -> Self {
        Self::placeholder(
            "Error",
            vec![],
            format!("Sorry, there was an error generating your recipe: {}", message),
        )
    }

    /// Served when a search reply holds no recipe array
    pub fn no_search_results() -> Self {
        let mut doc = Self::placeholder(
            "No Recipes Found",
            vec!["Please try a different search query"],
            "Sorry, I couldn't find any recipes matching your criteria.".to_string(),
        );
        doc.set("id", Value::from(1));
        doc.set("prepTime", Value::from(0));
        doc.set("cookTime", Value::from(0));
        doc
    }

    /// Served alongside a 500 when a search fails
    pub fn search_error(message: &str) -> Self {
        let mut doc = Self::placeholder(
            "Error",
            vec![],
            format!("Sorry, there was an error searching for recipes: {}", message),
        );
        doc.set("id", Value::from(0));
        doc.set("prepTime", Value::from(0));
        doc.set("cookTime", Value::from(0));
        doc
    }
}
