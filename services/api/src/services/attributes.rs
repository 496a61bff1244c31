//! Tag and ingredient management
//!
//! Attributes are only ever created through recipe writes; this service lists,
//! renames and deletes the ones a user already owns.

use std::sync::Arc;
use tracing::info;

use super::conflict_as_field_error;
use crate::{
    error::{ApiError, ApiResult},
    models::{Attribute, AttributeKind, AttributePayload},
    repositories::Store,
    validation::{self, WriteMode},
};

fn name_taken(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Tag => "tag with this name already exists.",
        AttributeKind::Ingredient => "ingredient with this name already exists.",
    }
}

#[derive(Clone)]
pub struct AttributeService {
    store: Arc<dyn Store>,
}

impl AttributeService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Attributes of `user_id` ordered by name descending
    pub async fn list(
        &self,
        kind: AttributeKind,
        user_id: i64,
        assigned_only: bool,
    ) -> ApiResult<Vec<Attribute>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_attributes(kind, user_id, assigned_only).await?)
    }

    pub async fn get(&self, kind: AttributeKind, id: i64, user_id: i64) -> ApiResult<Attribute> {
        let mut tx = self.store.begin().await?;
        tx.find_attribute(kind, id, user_id)
            .await?
            .ok_or(ApiError::NotFound)
    }

    /// Rename an attribute; a partial update without a name changes nothing
    pub async fn update(
        &self,
        kind: AttributeKind,
        id: i64,
        user_id: i64,
        payload: &AttributePayload,
        mode: WriteMode,
    ) -> ApiResult<Attribute> {
        let mut tx = self.store.begin().await?;
        let current = tx
            .find_attribute(kind, id, user_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        let Some(name) = validation::attribute_name(payload, mode)? else {
            return Ok(current);
        };

        let renamed = tx
            .rename_attribute(kind, id, &name)
            .await
            .map_err(|e| conflict_as_field_error(e, "name", name_taken(kind)))?;
        tx.commit().await?;

        info!("Renamed {} {} of user {}", kind.table(), id, user_id);
        Ok(renamed)
    }

    pub async fn delete(&self, kind: AttributeKind, id: i64, user_id: i64) -> ApiResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_attribute(kind, id, user_id).await? {
            return Err(ApiError::NotFound);
        }
        tx.commit().await?;

        info!("Deleted {} {} of user {}", kind.table(), id, user_id);
        Ok(())
    }
}
