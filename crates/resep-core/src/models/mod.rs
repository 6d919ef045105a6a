//! Data models for recipe-service entities.
//!
//! - `Recipe`, `RecipeDetail`: recipes as listed and as shown with ingredients
//! - `Ingredient`: one line of a recipe's ingredient list
//! - `RecipeDraft`, `IngredientDraft`: what the user submits when adding or editing
//! - `GeneratedRecipe`: a suggestion from the AI chef, ready to become a draft

pub mod chef;
pub mod recipe;

pub use chef::{photo_data_url, split_ingredients, ChefError, GeneratedRecipe, MAX_PHOTO_BYTES};
pub use recipe::{DraftError, Ingredient, IngredientDraft, Recipe, RecipeDetail, RecipeDraft, UserProfile};
