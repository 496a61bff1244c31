//! Recipe write-service
//!
//! A recipe is inserted or updated together with its tag and ingredient sets
//! inside one transaction. Names are resolved per owner with get-or-create,
//! so repeating a name inside one payload links a single row.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    error::{ApiError, ApiResult},
    models::{AttributeKind, Recipe, RecipeFilter, RecipePayload},
    repositories::{Store, StoreTx},
    storage::{ImageLimits, ImageStorage, image_key, inspect_image},
    validation::{self, WriteMode},
};

/// Resolve every name to an owned attribute and link it to the recipe
async fn attach_names(
    tx: &mut dyn StoreTx,
    kind: AttributeKind,
    user_id: i64,
    recipe_id: i64,
    names: &[String],
) -> ApiResult<()> {
    for name in names {
        let attribute = tx.get_or_create_attribute(kind, user_id, name).await?;
        tx.attach_attribute(kind, recipe_id, attribute.id).await?;
    }
    Ok(())
}

/// Replace the whole set of `kind` on a recipe
async fn replace_names(
    tx: &mut dyn StoreTx,
    kind: AttributeKind,
    user_id: i64,
    recipe_id: i64,
    names: &[String],
) -> ApiResult<()> {
    tx.clear_attributes(kind, recipe_id).await?;
    attach_names(tx, kind, user_id, recipe_id, names).await
}

#[derive(Clone)]
pub struct RecipeService {
    store: Arc<dyn Store>,
    storage: Arc<dyn ImageStorage>,
    limits: ImageLimits,
}

impl RecipeService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ImageStorage>, limits: ImageLimits) -> Self {
        Self {
            store,
            storage,
            limits,
        }
    }

    /// Recipes of `user_id`, newest first
    pub async fn list(&self, user_id: i64, filter: &RecipeFilter) -> ApiResult<Vec<Recipe>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_recipes(user_id, filter).await?)
    }

    pub async fn get(&self, id: i64, user_id: i64) -> ApiResult<Recipe> {
        let mut tx = self.store.begin().await?;
        tx.find_recipe(id, user_id).await?.ok_or(ApiError::NotFound)
    }

    /// Create a recipe with its nested tags and ingredients
    pub async fn create(&self, user_id: i64, payload: &RecipePayload) -> ApiResult<Recipe> {
        let draft = validation::recipe_draft(payload)?;

        info!("Creating recipe for user {}", user_id);

        let mut tx = self.store.begin().await?;
        let id = tx.insert_recipe(user_id, &draft.fields).await?;
        attach_names(tx.as_mut(), AttributeKind::Tag, user_id, id, &draft.tags).await?;
        attach_names(
            tx.as_mut(),
            AttributeKind::Ingredient,
            user_id,
            id,
            &draft.ingredients,
        )
        .await?;

        let recipe = tx
            .find_recipe(id, user_id)
            .await?
            .ok_or(ApiError::InternalServerError)?;
        tx.commit().await?;

        Ok(recipe)
    }

    /// Update a recipe; a given tag or ingredient list replaces the current set
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        payload: &RecipePayload,
        mode: WriteMode,
    ) -> ApiResult<Recipe> {
        let mut tx = self.store.begin().await?;
        if tx.find_recipe_for_update(id, user_id).await?.is_none() {
            return Err(ApiError::NotFound);
        }

        let update = validation::recipe_update(payload, mode)?;

        info!("Updating recipe {} for user {}", id, user_id);

        if !update.changes.is_empty() {
            tx.update_recipe(id, &update.changes).await?;
        }
        if let Some(tags) = &update.tags {
            replace_names(tx.as_mut(), AttributeKind::Tag, user_id, id, tags).await?;
        }
        if let Some(ingredients) = &update.ingredients {
            replace_names(tx.as_mut(), AttributeKind::Ingredient, user_id, id, ingredients)
                .await?;
        }

        let recipe = tx
            .find_recipe(id, user_id)
            .await?
            .ok_or(ApiError::InternalServerError)?;
        tx.commit().await?;

        Ok(recipe)
    }

    pub async fn delete(&self, id: i64, user_id: i64) -> ApiResult<()> {
        let mut tx = self.store.begin().await?;
        let recipe = tx.find_recipe(id, user_id).await?.ok_or(ApiError::NotFound)?;
        tx.delete_recipe(id, user_id).await?;
        tx.commit().await?;

        info!("Deleted recipe {} of user {}", id, user_id);

        if let Some(key) = recipe.image {
            self.discard_image(&key).await;
        }
        Ok(())
    }

    /// Store an uploaded image and point the recipe at it
    ///
    /// The previous image reference stays in place unless the new image is
    /// valid and stored.
    pub async fn attach_image(&self, id: i64, user_id: i64, bytes: Vec<u8>) -> ApiResult<Recipe> {
        self.get(id, user_id).await?;

        let limits = self.limits;
        let image = tokio::task::spawn_blocking(move || inspect_image(bytes, &limits))
            .await
            .map_err(|e| {
                error!("Image inspection task failed: {}", e);
                ApiError::InternalServerError
            })?
            .map_err(|message| ApiError::validation("image", message))?;
        let key = image_key(&image);

        self.storage.put(&key, &image).await.map_err(|e| {
            error!("Failed to store image {}: {:#}", key, e);
            ApiError::InternalServerError
        })?;

        let mut tx = self.store.begin().await?;
        let Some(previous) = tx.find_recipe_for_update(id, user_id).await? else {
            drop(tx);
            self.discard_image(&key).await;
            return Err(ApiError::NotFound);
        };
        tx.set_recipe_image(id, Some(&key)).await?;
        let recipe = tx
            .find_recipe(id, user_id)
            .await?
            .ok_or(ApiError::InternalServerError)?;
        tx.commit().await?;

        info!("Stored image {} for recipe {}", key, id);

        if let Some(old_key) = previous.image {
            self.discard_image(&old_key).await;
        }
        Ok(recipe)
    }

    /// Public URL of the recipe image
    pub fn image_url(&self, recipe: &Recipe) -> Option<String> {
        recipe.image.as_deref().map(|key| self.storage.url(key))
    }

    async fn discard_image(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            warn!("Failed to delete image {}: {:#}", key, e);
        }
    }
}
