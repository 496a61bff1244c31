//! Tags and ingredients
//!
//! Both are user-scoped labels with the same shape, so they share one record
//! type and are told apart by [`AttributeKind`].

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Nullable;

/// Which attribute table a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    /// Table holding the attribute rows
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking recipes to attributes
    pub fn link_table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    /// Attribute column of the join table
    pub fn link_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Name of the nested field on recipe payloads
    pub fn field(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    /// Uniqueness constraint on (user_id, name)
    pub fn unique_constraint(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags_user_id_name_key",
            AttributeKind::Ingredient => "ingredients_user_id_name_key",
        }
    }
}

/// Tag or ingredient row
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Attribute {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub name: String,
}

/// `{"name": ...}` body, used standalone and nested in recipe payloads
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttributePayload {
    #[serde(default, deserialize_with = "crate::models::present")]
    pub name: Nullable<String>,
}

/// Query parameters for attribute listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeQuery {
    /// A non-zero integer restricts the listing to attributes used by at
    /// least one recipe
    pub assigned_only: Option<String>,
}
