//! Recipe endpoints

use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};

use super::{JsonBody, PathParam, QueryParams};
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{Recipe, RecipeDetail, RecipeImageResponse, RecipePayload, RecipeQuery, RecipeSummary},
    state::AppState,
    validation::{self, WriteMode},
};

/// Multipart field carrying the upload
const IMAGE_FIELD: &str = "image";
const NO_FILE: &str = "No file was submitted.";

fn detail_json(state: &AppState, recipe: &Recipe) -> Json<RecipeDetail> {
    Json(RecipeDetail::new(recipe, state.recipes.image_url(recipe)))
}

/// Recipes of the caller, optionally filtered by tag and ingredient ids
pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    QueryParams(query): QueryParams<RecipeQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = validation::recipe_filter(&query)?;
    let recipes = state.recipes.list(user.id, &filter).await?;

    Ok(Json(
        recipes.iter().map(RecipeSummary::from).collect::<Vec<_>>(),
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    JsonBody(payload): JsonBody<RecipePayload>,
) -> ApiResult<impl IntoResponse> {
    let recipe = state.recipes.create(user.id, &payload).await?;

    Ok((StatusCode::CREATED, detail_json(&state, &recipe)))
}

/// Get a recipe by ID
pub async fn detail(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
) -> ApiResult<impl IntoResponse> {
    let recipe = state.recipes.get(id, user.id).await?;

    Ok(detail_json(&state, &recipe))
}

pub async fn replace(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    path: PathParam<i64>,
    body: JsonBody<RecipePayload>,
) -> ApiResult<impl IntoResponse> {
    write(state, auth, path, body, WriteMode::Full).await
}

pub async fn update(
    state: State<AppState>,
    auth: Extension<AuthUser>,
    path: PathParam<i64>,
    body: JsonBody<RecipePayload>,
) -> ApiResult<impl IntoResponse> {
    write(state, auth, path, body, WriteMode::Partial).await
}

async fn write(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<RecipePayload>,
    mode: WriteMode,
) -> ApiResult<Json<RecipeDetail>> {
    let recipe = state.recipes.update(id, user.id, &payload, mode).await?;

    Ok(detail_json(&state, &recipe))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
) -> ApiResult<impl IntoResponse> {
    state.recipes.delete(id, user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Attach an image sent as the `image` field of a multipart form
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    PathParam(id): PathParam<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let image = match multipart {
        Ok(multipart) => read_image_field(multipart).await?,
        Err(_) => None,
    };

    let Some(bytes) = image else {
        state.recipes.get(id, user.id).await?;
        return Err(ApiError::validation(IMAGE_FIELD, NO_FILE));
    };

    let recipe = state.recipes.attach_image(id, user.id, bytes).await?;
    let image = state
        .recipes
        .image_url(&recipe)
        .ok_or(ApiError::InternalServerError)?;

    Ok(Json(RecipeImageResponse { id: recipe.id, image }))
}

async fn read_image_field(mut multipart: Multipart) -> ApiResult<Option<Vec<u8>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
            return Ok(Some(bytes.to_vec()));
        }
    }

    Ok(None)
}
