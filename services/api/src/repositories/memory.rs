//! In-memory store
//!
//! Transactions take the store lock for their whole lifetime and work on a
//! copy of the state, which replaces the shared state on commit. Writers are
//! therefore fully serialized; the backend is meant for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use recipe_common::error::{DatabaseError, DatabaseResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::models::{
    Attribute, AttributeKind, NewUser, Recipe, RecipeChanges, RecipeFields, RecipeFilter, User,
    UserChanges,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    users: i64,
    recipes: i64,
    tags: i64,
    ingredients: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Recipe row plus its link sets; `recipe.tags`/`recipe.ingredients` stay empty
#[derive(Debug, Clone)]
struct RecipeRecord {
    recipe: Recipe,
    tag_ids: BTreeSet<i64>,
    ingredient_ids: BTreeSet<i64>,
}

impl RecipeRecord {
    fn links(&self, kind: AttributeKind) -> &BTreeSet<i64> {
        match kind {
            AttributeKind::Tag => &self.tag_ids,
            AttributeKind::Ingredient => &self.ingredient_ids,
        }
    }

    fn links_mut(&mut self, kind: AttributeKind) -> &mut BTreeSet<i64> {
        match kind {
            AttributeKind::Tag => &mut self.tag_ids,
            AttributeKind::Ingredient => &mut self.ingredient_ids,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequences: Sequences,
    users: BTreeMap<i64, User>,
    tokens: HashMap<String, i64>,
    recipes: BTreeMap<i64, RecipeRecord>,
    tags: BTreeMap<i64, Attribute>,
    ingredients: BTreeMap<i64, Attribute>,
}

impl MemoryState {
    fn attributes(&self, kind: AttributeKind) -> &BTreeMap<i64, Attribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attributes_mut(&mut self, kind: AttributeKind) -> &mut BTreeMap<i64, Attribute> {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn next_attribute_id(&mut self, kind: AttributeKind) -> i64 {
        match kind {
            AttributeKind::Tag => next_id(&mut self.sequences.tags),
            AttributeKind::Ingredient => next_id(&mut self.sequences.ingredients),
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }

    fn load(&self, record: &RecipeRecord) -> Recipe {
        let resolve = |kind: AttributeKind| -> Vec<Attribute> {
            record
                .links(kind)
                .iter()
                .filter_map(|id| self.attributes(kind).get(id).cloned())
                .collect()
        };

        Recipe {
            tags: resolve(AttributeKind::Tag),
            ingredients: resolve(AttributeKind::Ingredient),
            ..record.recipe.clone()
        }
    }

    fn is_assigned(&self, kind: AttributeKind, attribute_id: i64) -> bool {
        self.recipes
            .values()
            .any(|record| record.links(kind).contains(&attribute_id))
    }
}

/// Store keeping everything in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> DatabaseResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryStoreTx { guard, working }))
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(true)
    }
}

/// Transaction on [`MemoryStore`]
pub struct MemoryStoreTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    async fn insert_user(&mut self, new_user: &NewUser) -> DatabaseResult<User> {
        let state = &mut self.working;
        if state.email_taken(&new_user.email, None) {
            return Err(DatabaseError::Conflict("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: next_id(&mut state.sequences.users),
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            password_hash: new_user.password_hash.clone(),
            is_active: true,
            is_staff: new_user.is_staff,
            is_superuser: new_user.is_superuser,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&mut self, id: i64) -> DatabaseResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn update_user(
        &mut self,
        id: i64,
        changes: &UserChanges,
    ) -> DatabaseResult<Option<User>> {
        let state = &mut self.working;
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(DatabaseError::Conflict("users_email_key".to_string()));
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(password_hash) = &changes.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn find_token(&mut self, user_id: i64) -> DatabaseResult<Option<String>> {
        Ok(self
            .working
            .tokens
            .iter()
            .find(|(_, owner)| **owner == user_id)
            .map(|(key, _)| key.clone()))
    }

    async fn insert_token(&mut self, user_id: i64, key: &str) -> DatabaseResult<()> {
        let state = &mut self.working;
        if state.tokens.values().any(|owner| *owner == user_id) {
            return Err(DatabaseError::Conflict("auth_tokens_user_id_key".to_string()));
        }
        if state.tokens.contains_key(key) {
            return Err(DatabaseError::Conflict("auth_tokens_pkey".to_string()));
        }

        state.tokens.insert(key.to_string(), user_id);
        Ok(())
    }

    async fn find_user_by_token(&mut self, key: &str) -> DatabaseResult<Option<User>> {
        let state = &self.working;
        Ok(state
            .tokens
            .get(key)
            .and_then(|user_id| state.users.get(user_id))
            .cloned())
    }

    async fn insert_recipe(&mut self, user_id: i64, fields: &RecipeFields) -> DatabaseResult<i64> {
        let state = &mut self.working;
        let id = next_id(&mut state.sequences.recipes);
        let now = Utc::now();

        let recipe = Recipe {
            id,
            user_id,
            title: fields.title.clone(),
            description: fields.description.clone(),
            time_minutes: fields.time_minutes,
            price: fields.price,
            link: fields.link.clone(),
            image: None,
            tags: Vec::new(),
            ingredients: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        state.recipes.insert(
            id,
            RecipeRecord {
                recipe,
                tag_ids: BTreeSet::new(),
                ingredient_ids: BTreeSet::new(),
            },
        );

        Ok(id)
    }

    async fn find_recipe(&mut self, id: i64, user_id: i64) -> DatabaseResult<Option<Recipe>> {
        let state = &self.working;
        Ok(state
            .recipes
            .get(&id)
            .filter(|record| record.recipe.user_id == user_id)
            .map(|record| state.load(record)))
    }

    /// The whole store is held by this transaction already
    async fn find_recipe_for_update(
        &mut self,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<Option<Recipe>> {
        self.find_recipe(id, user_id).await
    }

    async fn list_recipes(
        &mut self,
        user_id: i64,
        filter: &RecipeFilter,
    ) -> DatabaseResult<Vec<Recipe>> {
        let state = &self.working;
        let matches = |record: &RecipeRecord, kind: AttributeKind, wanted: &[i64]| {
            wanted.is_empty() || wanted.iter().any(|id| record.links(kind).contains(id))
        };

        Ok(state
            .recipes
            .values()
            .rev()
            .filter(|record| record.recipe.user_id == user_id)
            .filter(|record| matches(record, AttributeKind::Tag, &filter.tags))
            .filter(|record| matches(record, AttributeKind::Ingredient, &filter.ingredients))
            .map(|record| state.load(record))
            .collect())
    }

    async fn update_recipe(&mut self, id: i64, changes: &RecipeChanges) -> DatabaseResult<()> {
        let Some(record) = self.working.recipes.get_mut(&id) else {
            return Ok(());
        };
        let recipe = &mut record.recipe;

        if let Some(title) = &changes.title {
            recipe.title = title.clone();
        }
        if let Some(description) = &changes.description {
            recipe.description = description.clone();
        }
        if let Some(time_minutes) = changes.time_minutes {
            recipe.time_minutes = time_minutes;
        }
        if let Some(price) = changes.price {
            recipe.price = price;
        }
        if let Some(link) = &changes.link {
            recipe.link = link.clone();
        }
        recipe.updated_at = Utc::now();

        Ok(())
    }

    async fn set_recipe_image(&mut self, id: i64, image: Option<&str>) -> DatabaseResult<()> {
        if let Some(record) = self.working.recipes.get_mut(&id) {
            record.recipe.image = image.map(str::to_string);
            record.recipe.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_recipe(&mut self, id: i64, user_id: i64) -> DatabaseResult<bool> {
        let state = &mut self.working;
        let owned = state
            .recipes
            .get(&id)
            .is_some_and(|record| record.recipe.user_id == user_id);

        if owned {
            state.recipes.remove(&id);
        }
        Ok(owned)
    }

    async fn get_or_create_attribute(
        &mut self,
        kind: AttributeKind,
        user_id: i64,
        name: &str,
    ) -> DatabaseResult<Attribute> {
        let state = &mut self.working;
        let existing = state
            .attributes(kind)
            .values()
            .find(|attribute| attribute.user_id == user_id && attribute.name == name)
            .cloned();

        if let Some(attribute) = existing {
            return Ok(attribute);
        }

        let attribute = Attribute {
            id: state.next_attribute_id(kind),
            user_id,
            name: name.to_string(),
        };
        state
            .attributes_mut(kind)
            .insert(attribute.id, attribute.clone());

        Ok(attribute)
    }

    async fn attach_attribute(
        &mut self,
        kind: AttributeKind,
        recipe_id: i64,
        attribute_id: i64,
    ) -> DatabaseResult<()> {
        if let Some(record) = self.working.recipes.get_mut(&recipe_id) {
            record.links_mut(kind).insert(attribute_id);
        }
        Ok(())
    }

    async fn clear_attributes(
        &mut self,
        kind: AttributeKind,
        recipe_id: i64,
    ) -> DatabaseResult<()> {
        if let Some(record) = self.working.recipes.get_mut(&recipe_id) {
            record.links_mut(kind).clear();
        }
        Ok(())
    }

    async fn list_attributes(
        &mut self,
        kind: AttributeKind,
        user_id: i64,
        assigned_only: bool,
    ) -> DatabaseResult<Vec<Attribute>> {
        let state = &self.working;
        let mut attributes: Vec<Attribute> = state
            .attributes(kind)
            .values()
            .filter(|attribute| attribute.user_id == user_id)
            .filter(|attribute| !assigned_only || state.is_assigned(kind, attribute.id))
            .cloned()
            .collect();

        attributes.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(attributes)
    }

    async fn find_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<Option<Attribute>> {
        Ok(self
            .working
            .attributes(kind)
            .get(&id)
            .filter(|attribute| attribute.user_id == user_id)
            .cloned())
    }

    async fn rename_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        name: &str,
    ) -> DatabaseResult<Attribute> {
        let attributes = self.working.attributes_mut(kind);

        let Some(user_id) = attributes.get(&id).map(|attribute| attribute.user_id) else {
            return Err(DatabaseError::Query(sqlx::Error::RowNotFound));
        };

        let clash = attributes
            .values()
            .any(|other| other.id != id && other.user_id == user_id && other.name == name);
        if clash {
            return Err(DatabaseError::Conflict(kind.unique_constraint().to_string()));
        }

        let attribute = attributes
            .get_mut(&id)
            .ok_or(DatabaseError::Query(sqlx::Error::RowNotFound))?;
        attribute.name = name.to_string();
        Ok(attribute.clone())
    }

    async fn delete_attribute(
        &mut self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
    ) -> DatabaseResult<bool> {
        let state = &mut self.working;
        let owned = state
            .attributes(kind)
            .get(&id)
            .is_some_and(|attribute| attribute.user_id == user_id);

        if owned {
            state.attributes_mut(kind).remove(&id);
            for record in state.recipes.values_mut() {
                record.links_mut(kind).remove(&id);
            }
        }
        Ok(owned)
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        let MemoryStoreTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: String::new(),
            password_hash: "hash".to_string(),
            is_staff: false,
            is_superuser: false,
        }
    }

    fn fields(title: &str) -> RecipeFields {
        RecipeFields {
            title: title.to_string(),
            description: String::new(),
            time_minutes: 10,
            price: Decimal::new(550, 2),
            link: String::new(),
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&new_user("a@example.com")).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(&new_user("a@example.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.find_user_by_id(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&new_user("a@example.com")).await.unwrap();

        let err = tx.insert_user(&new_user("a@example.com")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_get_or_create_is_scoped_by_owner() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = tx
            .get_or_create_attribute(AttributeKind::Tag, 1, "Vegan")
            .await
            .unwrap();
        let again = tx
            .get_or_create_attribute(AttributeKind::Tag, 1, "Vegan")
            .await
            .unwrap();
        let other_owner = tx
            .get_or_create_attribute(AttributeKind::Tag, 2, "Vegan")
            .await
            .unwrap();
        let ingredient = tx
            .get_or_create_attribute(AttributeKind::Ingredient, 1, "Vegan")
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_ne!(first.id, other_owner.id);
        assert_eq!(ingredient.id, 1);
    }

    #[tokio::test]
    async fn test_recipes_are_listed_newest_first_per_owner() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = tx.insert_recipe(1, &fields("First")).await.unwrap();
        tx.insert_recipe(2, &fields("Other")).await.unwrap();
        let second = tx.insert_recipe(1, &fields("Second")).await.unwrap();

        let ids: Vec<i64> = tx
            .list_recipes(1, &RecipeFilter::default())
            .await
            .unwrap()
            .iter()
            .map(|recipe| recipe.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
        assert!(tx.find_recipe(first, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_attribute_unlinks_recipes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let recipe_id = tx.insert_recipe(1, &fields("Soup")).await.unwrap();
        let tag = tx
            .get_or_create_attribute(AttributeKind::Tag, 1, "Dinner")
            .await
            .unwrap();
        tx.attach_attribute(AttributeKind::Tag, recipe_id, tag.id)
            .await
            .unwrap();

        assert!(tx.delete_attribute(AttributeKind::Tag, tag.id, 1).await.unwrap());
        let recipe = tx.find_recipe(recipe_id, 1).await.unwrap().unwrap();
        assert!(recipe.tags.is_empty());
    }

    #[tokio::test]
    async fn test_locking_lookup_is_owner_scoped() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let recipe_id = tx.insert_recipe(1, &fields("Soup")).await.unwrap();

        let locked = tx.find_recipe_for_update(recipe_id, 1).await.unwrap();
        assert_eq!(locked.map(|recipe| recipe.title), Some("Soup".to_string()));
        assert!(tx.find_recipe_for_update(recipe_id, 2).await.unwrap().is_none());
    }
}
