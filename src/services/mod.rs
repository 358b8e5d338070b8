// src/services/mod.rs
pub mod api_usage;
pub mod memory;
pub mod recipe_generator;
pub mod recipe_store;

pub use api_usage::{PgUsageStore, UsageStore, UsageTracker};
pub use memory::{MemoryRecipeStore, MemoryUsageStore};
pub use recipe_generator::{RecipeGenerator, RecipeOutcome, SearchOutcome};
pub use recipe_store::{PgRecipeStore, RecipeStore};
