//! User model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Nullable;

/// User entity
///
/// Deliberately not `Serialize`: responses go through [`UserResponse`] so the
/// password hash can never leak into a body.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// User update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

/// Validated input of the sign-up endpoint
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Validated profile update with a plaintext password still to be hashed
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Request body for sign-up and profile updates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default, deserialize_with = "crate::models::present")]
    pub email: Nullable<String>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub password: Nullable<String>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub name: Nullable<String>,
}

/// Request body for token issuance
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default, deserialize_with = "crate::models::present")]
    pub email: Nullable<String>,
    #[serde(default, deserialize_with = "crate::models::present")]
    pub password: Nullable<String>,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Response for token issuance
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
