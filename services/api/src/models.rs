//! Domain records, write inputs and API payloads

use serde::{Deserialize, Deserializer};

pub mod attribute;
pub mod recipe;
pub mod user;

// Re-export for convenience
pub use attribute::{Attribute, AttributeKind, AttributePayload, AttributeQuery};
pub use recipe::{
    Recipe, RecipeChanges, RecipeDetail, RecipeDraft, RecipeFields, RecipeFilter,
    RecipeImageResponse, RecipePayload, RecipeQuery, RecipeSummary, RecipeUpdate,
};
pub use user::{
    NewUser, ProfileUpdate, Registration, TokenRequest, TokenResponse, User, UserChanges,
    UserPayload, UserResponse,
};

/// Payload field as sent: `None` when the key is absent, `Some(None)` for an
/// explicit `null`
pub type Nullable<T> = Option<Option<T>>;

/// Deserialize a key that is present, keeping `null` apart from absence
///
/// Pair with `#[serde(default)]` so a missing key stays `None`.
pub fn present<'de, D, T>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_keeps_null_apart_from_absence() {
        let absent: RecipePayload = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.tags, None);
        assert_eq!(absent.title, None);

        let null: RecipePayload =
            serde_json::from_str(r#"{"tags": null, "title": null}"#).unwrap();
        assert_eq!(null.tags, Some(None));
        assert_eq!(null.title, Some(None));

        let value: AttributePayload = serde_json::from_str(r#"{"name": "Vegan"}"#).unwrap();
        assert_eq!(value.name, Some(Some("Vegan".to_string())));
    }
}
