//! Accounts and tokens

use rand::{Rng, distributions::Alphanumeric};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{PasswordService, conflict_as_field_error};
use crate::{
    error::{ApiError, ApiResult},
    models::{NewUser, ProfileUpdate, User, UserChanges},
    repositories::Store,
    validation::{NON_FIELD_ERRORS, normalize_email},
};

/// Length of issued token keys
pub const TOKEN_LENGTH: usize = 40;

pub const EMAIL_REQUIRED: &str = "Users must have an email address.";
pub const EMAIL_TAKEN: &str = "user with this email already exists.";
pub const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn internal(err: anyhow::Error) -> ApiError {
    error!("{:#}", err);
    ApiError::InternalServerError
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    passwords: PasswordService,
    /// Verified against when the email is unknown so both failures cost the same
    dummy_hash: String,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, passwords: PasswordService) -> anyhow::Result<Self> {
        let dummy_hash = passwords.hash(&generate_token())?;
        Ok(Self {
            store,
            passwords,
            dummy_hash,
        })
    }

    /// Create a regular user
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> ApiResult<User> {
        self.insert(email, password, name, false).await
    }

    /// Create a user with the staff and superuser flags set
    pub async fn create_superuser(&self, email: &str, password: &str) -> ApiResult<User> {
        self.insert(email, password, None, true).await
    }

    async fn insert(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        privileged: bool,
    ) -> ApiResult<User> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::validation("email", EMAIL_REQUIRED));
        }

        let new_user = NewUser {
            email: normalize_email(email),
            name: name.unwrap_or_default().to_string(),
            password_hash: self.passwords.hash(password).map_err(internal)?,
            is_staff: privileged,
            is_superuser: privileged,
        };

        info!("Creating user {}", new_user.email);

        let mut tx = self.store.begin().await?;
        let user = tx
            .insert_user(&new_user)
            .await
            .map_err(|e| conflict_as_field_error(e, "email", EMAIL_TAKEN))?;
        tx.commit().await?;

        Ok(user)
    }

    /// Check credentials; unknown email and wrong password are indistinguishable
    pub async fn authenticate(&self, email: &str, password: &str) -> ApiResult<User> {
        let email = normalize_email(email.trim());

        let mut tx = self.store.begin().await?;
        let user = tx.find_user_by_email(&email).await?;
        drop(tx);

        let Some(user) = user else {
            let _ = self.passwords.verify(password, &self.dummy_hash);
            return Err(ApiError::validation(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
        };

        if !self.passwords.verify(password, &user.password_hash) || !user.is_active {
            warn!("Failed authentication for user {}", user.id);
            return Err(ApiError::validation(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
        }

        Ok(user)
    }

    /// Token of `user`, created on first use
    pub async fn issue_token(&self, user: &User) -> ApiResult<String> {
        let mut tx = self.store.begin().await?;
        if let Some(key) = tx.find_token(user.id).await? {
            return Ok(key);
        }

        let key = generate_token();
        match tx.insert_token(user.id, &key).await {
            Ok(()) => {
                tx.commit().await?;
                info!("Issued token for user {}", user.id);
                Ok(key)
            }
            Err(err) if err.is_conflict() => {
                // Lost a race with a concurrent request for the same user
                drop(tx);
                let mut tx = self.store.begin().await?;
                tx.find_token(user.id)
                    .await?
                    .ok_or(ApiError::InternalServerError)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Owner of a token key
    pub async fn user_for_token(&self, key: &str) -> ApiResult<Option<User>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_user_by_token(key).await?)
    }

    /// Apply a validated profile update; a new password is re-hashed
    pub async fn update_profile(&self, user: &User, update: ProfileUpdate) -> ApiResult<User> {
        let password_hash = match update.password.as_deref() {
            Some(password) => Some(self.passwords.hash(password).map_err(internal)?),
            None => None,
        };

        let changes = UserChanges {
            email: update.email.as_deref().map(normalize_email),
            name: update.name,
            password_hash,
        };

        let mut tx = self.store.begin().await?;
        let updated = tx
            .update_user(user.id, &changes)
            .await
            .map_err(|e| conflict_as_field_error(e, "email", EMAIL_TAKEN))?
            .ok_or(ApiError::NotFound)?;
        tx.commit().await?;

        info!("Updated profile of user {}", user.id);
        Ok(updated)
    }
}
