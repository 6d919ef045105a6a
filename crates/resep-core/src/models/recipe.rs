use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::{format_date, truncate_string};

/// Recipe author as embedded by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Recipe {
    pub id: i64,
    pub created_at: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "User", default)]
    pub author: Option<UserProfile>,
}

impl Recipe {
    pub fn author_display(&self) -> String {
        match self.author {
            Some(ref author) if !author.full_name.trim().is_empty() => author.full_name.clone(),
            Some(ref author) => author.email.clone(),
            None => "Unknown".to_string(),
        }
    }

    pub fn created_display(&self) -> String {
        format_date(&self.created_at)
    }

    /// One-line summary for list views
    pub fn summary(&self, max_len: usize) -> String {
        truncate_string(&self.description, max_len)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Ingredient {
    pub id: i64,
    pub created_at: String,
    pub recipe_id: i64,
    pub name: String,
    pub quantity: String,
}

/// A recipe together with its ingredient list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DraftError {
    #[error("Recipe title cannot be empty")]
    EmptyTitle,

    #[error("Ingredient {0} needs both a name and a quantity")]
    IncompleteIngredient(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IngredientDraft {
    pub name: String,
    pub quantity: String,
}

impl IngredientDraft {
    /// Parse `name=quantity` as typed on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        let (name, quantity) = s.split_once('=')?;
        Some(Self {
            name: name.trim().to_string(),
            quantity: quantity.trim().to_string(),
        })
    }
}

/// Payload sent as the `data` part when adding or editing a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RecipeDraft {
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub ingredients: Vec<IngredientDraft>,
    /// Photo already stored by the backend. Sent back on edit so it survives
    /// when no new image is uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl RecipeDraft {
    /// Start an edit from the current server copy.
    pub fn from_detail(detail: &RecipeDetail) -> Self {
        Self {
            title: detail.recipe.title.clone(),
            description: detail.recipe.description.clone(),
            instructions: detail.recipe.instructions.clone(),
            ingredients: detail
                .ingredients
                .iter()
                .map(|i| IngredientDraft {
                    name: i.name.clone(),
                    quantity: i.quantity.clone(),
                })
                .collect(),
            image_url: detail.recipe.image_url.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.title.trim().is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        // Numbered from 1 for display
        if let Some(pos) = self
            .ingredients
            .iter()
            .position(|i| i.name.trim().is_empty() || i.quantity.trim().is_empty())
        {
            return Err(DraftError::IncompleteIngredient(pos + 1));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipe_detail() {
        let json = r#"{"id": 7, "created_at": "2025-03-01T10:00:00+00:00", "owner_id": "u1", "title": "Nasi Goreng", "description": "Fried rice", "instructions": "Fry it", "image_url": null, "User": {"full_name": "Siti", "email": "siti@example.com"}, "ingredients": [{"id": 1, "created_at": "2025-03-01T10:00:00+00:00", "recipe_id": 7, "name": "Rice", "quantity": "2 cups"}]}"#;

        let detail: RecipeDetail = serde_json::from_str(json).expect("Failed to parse recipe detail JSON");
        assert_eq!(detail.recipe.id, 7);
        assert_eq!(detail.recipe.owner_id, "u1");
        assert_eq!(detail.recipe.author_display(), "Siti");
        assert_eq!(detail.recipe.created_display(), "Mar 01, 2025");
        assert_eq!(detail.ingredients.len(), 1);
        assert_eq!(detail.ingredients[0].quantity, "2 cups");
    }

    #[test]
    fn test_parse_recipe_without_author() {
        let json = r#"{"id": 1, "created_at": "2025-03-01", "owner_id": "u2", "title": "Soto"}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.author_display(), "Unknown");
        assert_eq!(recipe.image_url, None);
    }

    #[test]
    fn test_ingredient_draft_parse() {
        assert_eq!(
            IngredientDraft::parse("Garlic = 3 cloves"),
            Some(IngredientDraft { name: "Garlic".into(), quantity: "3 cloves".into() })
        );
        assert_eq!(IngredientDraft::parse("Garlic"), None);
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = RecipeDraft {
            title: "Rendang".into(),
            ingredients: vec![
                IngredientDraft { name: "Beef".into(), quantity: "1 kg".into() },
                IngredientDraft { name: "Coconut milk".into(), quantity: " ".into() },
            ],
            ..Default::default()
        };
        assert_eq!(draft.validate(), Err(DraftError::IncompleteIngredient(2)));

        draft.ingredients[1].quantity = "400 ml".into();
        assert_eq!(draft.validate(), Ok(()));

        draft.title.clear();
        assert_eq!(draft.validate(), Err(DraftError::EmptyTitle));
    }

    #[test]
    fn test_draft_serializes_as_backend_payload() {
        let draft = RecipeDraft {
            title: "Sate".into(),
            description: "Skewers".into(),
            instructions: "Grill".into(),
            ingredients: vec![IngredientDraft { name: "Chicken".into(), quantity: "500 g".into() }],
            image_url: None,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["ingredients"][0]["name"], "Chicken");
        assert_eq!(value["title"], "Sate");
        // New recipes carry no image_url key at all
        assert!(value.get("image_url").is_none());
    }

    #[test]
    fn test_edit_payload_keeps_existing_image() {
        let json = r#"{"id": 3, "created_at": "2025-03-01", "owner_id": "u1", "title": "Soto", "image_url": "https://cdn.example.com/soto.jpg", "ingredients": [{"id": 1, "created_at": "2025-03-01", "recipe_id": 3, "name": "Chicken", "quantity": "500 g"}]}"#;
        let detail: RecipeDetail = serde_json::from_str(json).unwrap();

        let mut draft = RecipeDraft::from_detail(&detail);
        draft.title = "Soto Ayam".into();

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["image_url"], "https://cdn.example.com/soto.jpg");
        assert_eq!(value["title"], "Soto Ayam");
        assert_eq!(value["ingredients"][0]["quantity"], "500 g");
    }
}
