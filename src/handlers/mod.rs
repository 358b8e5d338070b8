// src/handlers/mod.rs
pub mod recipe;
pub mod status;
