//! Tag and ingredient endpoints
//!
//! Both resources share the handlers below; the router built for each kind
//! carries the [`AttributeKind`] as a request extension.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use super::{JsonBody, PathParam, QueryParams};
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{AttributeKind, AttributePayload, AttributeQuery},
    state::AppState,
    validation::{self, WriteMode},
};

/// `/<kind>` and `/<kind>/:id` routes for one attribute kind
pub fn router(kind: AttributeKind) -> Router<AppState> {
    let collection = format!("/{}", kind.field());
    let item = format!("{}/:id", collection);

    Router::new()
        .route(&collection, get(list))
        .route(&item, get(detail).put(replace).patch(update).delete(destroy))
        .layer(Extension(kind))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<AttributeKind>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    QueryParams(query): QueryParams<AttributeQuery>,
) -> ApiResult<impl IntoResponse> {
    let assigned_only = validation::assigned_only(&query)?;
    let attributes = state.attributes.list(kind, user.id, assigned_only).await?;

    Ok(Json(attributes))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(kind): Extension<AttributeKind>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
) -> ApiResult<impl IntoResponse> {
    let attribute = state.attributes.get(kind, id, user.id).await?;

    Ok(Json(attribute))
}

pub async fn replace(
    state: State<AppState>,
    kind: Extension<AttributeKind>,
    auth: Extension<AuthUser>,
    path: PathParam<i64>,
    body: JsonBody<AttributePayload>,
) -> ApiResult<impl IntoResponse> {
    write(state, kind, auth, path, body, WriteMode::Full).await
}

pub async fn update(
    state: State<AppState>,
    kind: Extension<AttributeKind>,
    auth: Extension<AuthUser>,
    path: PathParam<i64>,
    body: JsonBody<AttributePayload>,
) -> ApiResult<impl IntoResponse> {
    write(state, kind, auth, path, body, WriteMode::Partial).await
}

async fn write(
    State(state): State<AppState>,
    Extension(kind): Extension<AttributeKind>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<AttributePayload>,
    mode: WriteMode,
) -> ApiResult<impl IntoResponse> {
    let attribute = state
        .attributes
        .update(kind, id, user.id, &payload, mode)
        .await?;

    Ok(Json(attribute))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(kind): Extension<AttributeKind>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
) -> ApiResult<impl IntoResponse> {
    state.attributes.delete(kind, id, user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
