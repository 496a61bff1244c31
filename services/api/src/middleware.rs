//! Authentication middleware for token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{error::ApiError, models::User, state::AppState};

pub const CREDENTIALS_MISSING: &str = "Authentication credentials were not provided.";
pub const INVALID_TOKEN: &str = "Invalid token.";
pub const USER_INACTIVE: &str = "User inactive or deleted.";

/// Authenticated user, inserted into the request extensions
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Resolve the bearer token to an active user or reject with 401
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized(CREDENTIALS_MISSING.to_string()))?;

    let user = state
        .accounts
        .user_for_token(bearer.token())
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized(USER_INACTIVE.to_string()));
    }

    req.extensions_mut().insert(AuthUser(user));

    Ok(next.run(req).await)
}
