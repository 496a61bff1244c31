//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    error::ApiError,
    middleware::auth_middleware,
    models::AttributeKind,
    state::AppState,
};

pub mod attributes;
pub mod recipes;
pub mod users;

/// JSON body whose rejections are reported as [`ApiError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path parameters; one that fails to parse is reported as not found
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// Query string whose rejections are reported as [`ApiError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(users::me).put(users::replace_me).patch(users::update_me),
        )
        .route("/recipes", get(recipes::list).post(recipes::create))
        .route(
            "/recipes/:id",
            get(recipes::detail)
                .put(recipes::replace)
                .patch(recipes::update)
                .delete(recipes::destroy),
        )
        .route(
            "/recipes/:id/upload-image",
            post(recipes::upload_image).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .merge(attributes::router(AttributeKind::Tag))
        .merge(attributes::router(AttributeKind::Ingredient))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(users::create))
        .route("/users/token", post(users::token))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.store.health_check().await {
        Ok(true) => "ok",
        Ok(false) => "unavailable",
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "service": "recipe-api",
        "database": database,
    }))
}
