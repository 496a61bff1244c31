//! Business logic on top of the store
//!
//! Each public service method opens one store transaction and commits it only
//! once every step has succeeded.

use recipe_common::error::DatabaseError;

use crate::error::ApiError;

pub mod accounts;
pub mod attributes;
pub mod passwords;
pub mod recipes;

pub use accounts::AccountService;
pub use attributes::AttributeService;
pub use passwords::PasswordService;
pub use recipes::RecipeService;

/// Turn a unique violation into a field error, pass everything else through
fn conflict_as_field_error(err: DatabaseError, field: &str, message: &str) -> ApiError {
    if err.is_conflict() {
        ApiError::validation(field, message)
    } else {
        ApiError::Database(err)
    }
}
