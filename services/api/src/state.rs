//! Application state shared across handlers

use std::sync::Arc;

use crate::{
    config::MediaSettings,
    repositories::Store,
    services::{AccountService, AttributeService, PasswordService, RecipeService},
    storage::{ImageLimits, ImageStorage},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub accounts: AccountService,
    pub recipes: RecipeService,
    pub attributes: AttributeService,
    /// Body limit of the image upload route
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the services on top of a store and an image backend
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ImageStorage>,
        passwords: PasswordService,
        media: &MediaSettings,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            accounts: AccountService::new(store.clone(), passwords)?,
            recipes: RecipeService::new(store.clone(), storage, ImageLimits::from(media)),
            attributes: AttributeService::new(store.clone()),
            store,
            max_upload_bytes: media.max_upload_bytes,
        })
    }
}
