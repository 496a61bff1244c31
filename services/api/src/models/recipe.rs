//! Recipe model and related payloads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    Nullable,
    attribute::{Attribute, AttributePayload},
};

/// Recipe entity with its tag and ingredient sets loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    /// Storage key of the uploaded image
    pub image: Option<String>,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scalar columns of a new recipe
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFields {
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

/// Scalar recipe update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
}

impl RecipeChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.time_minutes.is_none()
            && self.price.is_none()
            && self.link.is_none()
    }
}

/// Validated input of a recipe create
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub fields: RecipeFields,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
}

/// Validated input of a recipe update
///
/// `tags`/`ingredients` of `Some(vec![])` clear the set, `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeUpdate {
    pub changes: RecipeChanges,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

/// Listing filter; empty id lists do not filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

/// Request body for recipe create/update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePayload {
    #[serde(default, deserialize_with = "crate::models::present")]
    pub title: Nullable<String>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub description: Nullable<String>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub time_minutes: Nullable<i32>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub price: Nullable<Decimal>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub link: Nullable<String>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub tags: Nullable<Vec<AttributePayload>>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub ingredients: Nullable<Vec<AttributePayload>>,
}

/// Query parameters for recipe listing, comma separated ids
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// List representation of a recipe
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        let mut price = recipe.price;
        price.rescale(2);

        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            time_minutes: recipe.time_minutes,
            price,
            link: recipe.link.clone(),
            tags: recipe.tags.clone(),
            ingredients: recipe.ingredients.clone(),
        }
    }
}

/// Detail representation of a recipe
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
    /// Public URL of the image
    pub image: Option<String>,
}

impl RecipeDetail {
    pub fn new(recipe: &Recipe, image_url: Option<String>) -> Self {
        Self {
            summary: RecipeSummary::from(recipe),
            description: recipe.description.clone(),
            image: image_url,
        }
    }
}

/// Response of the image upload endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RecipeImageResponse {
    pub id: i64,
    pub image: String,
}
