//! Account endpoints

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use super::JsonBody;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{TokenRequest, TokenResponse, UserPayload, UserResponse},
    state::AppState,
    validation::{self, WriteMode},
};

/// Sign up
pub async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UserPayload>,
) -> ApiResult<impl IntoResponse> {
    let registration = validation::registration(&payload)?;

    let user = state
        .accounts
        .create_user(
            &registration.email,
            &registration.password,
            Some(&registration.name),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Exchange credentials for the user's token
pub async fn token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let (email, password) = validation::token_request(&request)?;

    let user = state.accounts.authenticate(&email, &password).await?;
    let token = state.accounts.issue_token(&user).await?;

    Ok(Json(TokenResponse { token }))
}

/// Profile of the authenticated user
pub async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> impl IntoResponse {
    Json(UserResponse::from(&user))
}

pub async fn replace_me(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    body: JsonBody<UserPayload>,
) -> ApiResult<impl IntoResponse> {
    write_me(state, auth, body, WriteMode::Full).await
}

pub async fn update_me(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    body: JsonBody<UserPayload>,
) -> ApiResult<impl IntoResponse> {
    write_me(state, auth, body, WriteMode::Partial).await
}

async fn write_me(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    JsonBody(payload): JsonBody<UserPayload>,
    mode: WriteMode,
) -> ApiResult<Json<UserResponse>> {
    let update = validation::profile_update(&payload, mode)?;
    let user = state.accounts.update_profile(&user, update).await?;

    Ok(Json(UserResponse::from(&user)))
}
