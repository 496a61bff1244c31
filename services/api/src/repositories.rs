//! Repositories for database operations
//!
//! Every service call opens one [`StoreTx`] from a [`Store`], performs all of
//! its reads and writes through it and commits at the end. Dropping a
//! transaction without committing discards its writes, so a request that
//! fails halfway never leaves partial state behind.

use async_trait::async_trait;
use recipe_common::error::DatabaseResult;

use crate::models::{
    Attribute, AttributeKind, NewUser, Recipe, RecipeChanges, RecipeFields, RecipeFilter, User,
    UserChanges,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Source of transactions
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> DatabaseResult<Box<dyn StoreTx>>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> DatabaseResult<bool>;
}

/// One unit of work against the store
///
/// Recipe and attribute reads take the owner id and return `None` for rows
/// owned by someone else.
#[async_trait]
pub trait StoreTx: Send {
    /// Insert a user; a taken email is a `Conflict`
    async fn insert_user(&mut self, new_user: &NewUser) -> DatabaseResult<User>;

    /// Find a user by ID
    async fn find_user_by_id(&mut self, id: i64) -> DatabaseResult<Option<User>>;

    /// Find a user by normalized email
    async fn find_user_by_email(&mut self, email: &str) -> DatabaseResult<Option<User>>;

    /// Apply `changes`, returning the updated user
    async fn update_user(&mut self, id: i64, changes: &UserChanges)
    -> DatabaseResult<Option<User>>;

    /// Token key issued to a user, if any
    async fn find_token(&mut self, user_id: i64) -> DatabaseResult<Option<String>>;

    /// Store a token key; a second token for the same user is a `Conflict`
    async fn insert_token(&mut self, user_id: i64, key: &str) -> DatabaseResult<()>;

    /// Owner of a token key
    async fn find_user_by_token(&mut self, key: &str) -> DatabaseResult<Option<User>>;

    /// Insert a recipe without relations, returning its id
    async fn insert_recipe(&mut self, user_id: i64, fields: &RecipeFields) -> DatabaseResult<i64>;

    /// Recipe with its tags and ingredients
    async fn find_recipe(&mut self, id: i64, user_id: i64) -> DatabaseResult<Option<Recipe>>;

    /// Like [`StoreTx::find_recipe`], holding a row lock until the transaction
    /// ends so concurrent writers of one recipe run one after the other
    async fn find_recipe_for_update(
        &mut self,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<Option<Recipe>>;

    /// Recipes of a user, newest id first
    async fn list_recipes(
        &mut self,
        user_id: i64,
        filter: &RecipeFilter,
    ) -> DatabaseResult<Vec<Recipe>>;

    /// Apply scalar changes to a recipe
    async fn update_recipe(&mut self, id: i64, changes: &RecipeChanges) -> DatabaseResult<()>;

    /// Replace the stored image key
    async fn set_recipe_image(&mut self, id: i64, image: Option<&str>) -> DatabaseResult<()>;

    /// Delete a recipe, returning whether a row went away
    async fn delete_recipe(&mut self, id: i64, user_id: i64) -> DatabaseResult<bool>;

    /// Fetch the (user, name) attribute or insert it
    async fn get_or_create_attribute(
        &mut self,
        kind: AttributeKind,
        user_id: i64,
        name: &str,
    ) -> DatabaseResult<Attribute>;

    /// Link an attribute to a recipe; linking twice is a no-op
    async fn attach_attribute(
        &mut self,
        kind: AttributeKind,
        recipe_id: i64,
        attribute_id: i64,
    ) -> DatabaseResult<()>;

    /// Unlink every attribute of `kind` from a recipe
    async fn clear_attributes(&mut self, kind: AttributeKind, recipe_id: i64)
    -> DatabaseResult<()>;

    /// Attributes of a user ordered by name descending
    async fn list_attributes(
        &mut self,
        kind: AttributeKind,
        user_id: i64,
        assigned_only: bool,
    ) -> DatabaseResult<Vec<Attribute>>;

    /// Find an attribute owned by `user_id`
    async fn find_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<Option<Attribute>>;

    /// Rename an attribute; clashing with a sibling name is a `Conflict`
    async fn rename_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        name: &str,
    ) -> DatabaseResult<Attribute>;

    /// Delete an attribute, returning whether a row went away
    async fn delete_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<bool>;

    /// Publish every write of this transaction
    async fn commit(self: Box<Self>) -> DatabaseResult<()>;
}
