//! Shared harness for the HTTP integration tests
//!
//! Requests run through the real router with `oneshot`, backed by the
//! in-memory store and image storage.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use recipe_api::{
    AppState,
    config::{MediaSettings, PasswordSettings},
    create_router,
    repositories::MemoryStore,
    services::PasswordService,
    storage::MemoryImageStorage,
};
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "testpass123";
/// Body limit of the upload route in the test app
pub const UPLOAD_LIMIT: usize = 1024 * 1024;
const BOUNDARY: &str = "recipe-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub images: MemoryImageStorage,
}

impl TestApp {
    pub fn new() -> Self {
        let images = MemoryImageStorage::new();
        let passwords = PasswordService::new(&PasswordSettings {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();

        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(images.clone()),
            passwords,
            &MediaSettings {
                max_upload_bytes: UPLOAD_LIMIT,
                ..MediaSettings::default()
            },
        )
        .unwrap();

        Self {
            router: create_router(state),
            images,
        }
    }

    /// Send a request and return the status with the decoded JSON body
    ///
    /// An empty body decodes as `Value::Null`.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Sign up a user and return their token
    pub async fn signup(&self, email: &str) -> String {
        let (status, _) = self
            .request(
                Method::POST,
                "/users",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": "Test Name" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .request(
                Method::POST,
                "/users/token",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        body["token"].as_str().unwrap().to_string()
    }

    /// Create a recipe with the given extra fields and return its JSON
    pub async fn create_recipe(&self, token: &str, extra: Value) -> Value {
        let mut body = json!({
            "title": "Sample recipe",
            "time_minutes": 22,
            "price": "5.25",
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }

        let (status, recipe) = self.post("/recipes", token, body).await;
        assert_eq!(status, StatusCode::CREATED, "{}", recipe);
        recipe
    }

    /// POST a multipart form with one file field
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }
}

/// A small valid PNG
pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(10, 10, Rgb([30, 120, 200]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}
