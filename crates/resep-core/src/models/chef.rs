use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::recipe::{IngredientDraft, RecipeDraft};

/// Largest photo accepted for food identification (5 MB).
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChefError {
    #[error("Enter at least one ingredient")]
    NoIngredients,

    #[error("Photo is {size} bytes; the limit is {max} bytes (5 MB)")]
    PhotoTooLarge { size: usize, max: usize },
}

/// Recipe suggested by the backend's AI chef.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GeneratedRecipe {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<IngredientDraft>,
    #[serde(default)]
    pub instructions: String,
}

impl GeneratedRecipe {
    /// Turn the suggestion into a draft the user can publish.
    pub fn into_draft(self) -> RecipeDraft {
        RecipeDraft {
            title: self.title,
            description: self.description,
            instructions: self.instructions,
            ingredients: self.ingredients,
            image_url: None,
        }
    }
}

/// Split free-form ingredient input on commas and newlines.
pub fn split_ingredients(input: &str) -> Result<Vec<String>, ChefError> {
    let list: Vec<String> = input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if list.is_empty() {
        return Err(ChefError::NoIngredients);
    }
    Ok(list)
}

/// Encode a photo as a `data:` URL, refusing anything over [`MAX_PHOTO_BYTES`].
pub fn photo_data_url(bytes: &[u8], mime: &str) -> Result<String, ChefError> {
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(ChefError::PhotoTooLarge {
            size: bytes.len(),
            max: MAX_PHOTO_BYTES,
        });
    }
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
