//! Recipe endpoints, including nested tags/ingredients and image upload

mod support;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};
use support::{TestApp, UPLOAD_LIMIT, png_bytes};

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}

fn recipe_url(id: &Value) -> String {
    format!("/recipes/{}", id)
}

#[tokio::test]
async fn test_recipes_require_authentication() {
    let app = TestApp::new();

    let (status, _) = app.request(Method::GET, "/recipes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_retrieve_recipe() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    let created = app
        .create_recipe(
            &token,
            json!({
                "description": "Slow cooked",
                "link": "https://example.com/recipe.pdf",
                "tags": [{ "name": "Thai" }, { "name": "Dinner" }],
                "ingredients": [{ "name": "Prawns" }],
            }),
        )
        .await;

    assert_eq!(created["title"], "Sample recipe");
    assert_eq!(created["price"], "5.25");
    assert_eq!(created["image"], Value::Null);
    assert_eq!(names(&created["tags"]), vec!["Thai", "Dinner"]);

    let (status, fetched) = app.get(&recipe_url(&created["id"]), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
    assert_eq!(fetched["description"], "Slow cooked");
    assert_eq!(fetched["link"], "https://example.com/recipe.pdf");
    assert_eq!(names(&fetched["ingredients"]), vec!["Prawns"]);
}

#[tokio::test]
async fn test_list_is_owner_scoped_newest_first_and_summarized() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let other = app.signup("other@example.com").await;

    let first = app.create_recipe(&token, json!({ "title": "First" })).await;
    let second = app.create_recipe(&token, json!({ "title": "Second" })).await;
    app.create_recipe(&other, json!({ "title": "Foreign" })).await;

    let (status, body) = app.get("/recipes", &token).await;
    assert_eq!(status, StatusCode::OK);

    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], second["id"]);
    assert_eq!(list[1]["id"], first["id"]);
    assert!(list[0].get("description").is_none());
    assert!(list[0].get("image").is_none());
}

#[tokio::test]
async fn test_create_recipe_validation() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    let (status, body) = app
        .post("/recipes", &token, json!({ "price": "1234.5" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["title"].is_array());
    assert!(body["fields"]["time_minutes"].is_array());
    assert!(body["fields"]["price"].is_array());
}

#[tokio::test]
async fn test_repeated_tag_names_link_one_tag() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    let recipe = app
        .create_recipe(
            &token,
            json!({ "tags": [{ "name": "Vegan" }, { "name": "Vegan" }] }),
        )
        .await;
    assert_eq!(names(&recipe["tags"]), vec!["Vegan"]);

    let (_, tags) = app.get("/tags", &token).await;
    assert_eq!(tags.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_existing_tag_is_reused() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    let first = app
        .create_recipe(&token, json!({ "tags": [{ "name": "Indian" }] }))
        .await;
    let second = app
        .create_recipe(
            &token,
            json!({ "tags": [{ "name": "Indian" }, { "name": "Breakfast" }] }),
        )
        .await;

    assert_eq!(first["tags"][0]["id"], second["tags"][0]["id"]);
    let (_, tags) = app.get("/tags", &token).await;
    assert_eq!(names(&tags), vec!["Indian", "Breakfast"]);
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app
        .create_recipe(&token, json!({ "link": "https://example.com" }))
        .await;

    let (status, updated) = app
        .patch(&recipe_url(&recipe["id"]), &token, json!({ "title": "New title" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "New title");
    assert_eq!(updated["link"], "https://example.com");
    assert_eq!(updated["price"], "5.25");
}

#[tokio::test]
async fn test_full_update_replaces_fields() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app
        .create_recipe(
            &token,
            json!({ "link": "https://example.com", "description": "Old" }),
        )
        .await;

    let (status, body) = app
        .put(&recipe_url(&recipe["id"]), &token, json!({ "title": "Only title" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["price"].is_array());

    let (status, updated) = app
        .put(
            &recipe_url(&recipe["id"]),
            &token,
            json!({ "title": "Replaced", "time_minutes": 5, "price": "2.5" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Replaced");
    assert_eq!(updated["time_minutes"], 5);
    assert_eq!(updated["price"], "2.50");
}

#[tokio::test]
async fn test_update_tags_replaces_and_empty_list_clears() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app
        .create_recipe(
            &token,
            json!({
                "tags": [{ "name": "Breakfast" }],
                "ingredients": [{ "name": "Eggs" }],
            }),
        )
        .await;
    let url = recipe_url(&recipe["id"]);

    let (status, updated) = app
        .patch(&url, &token, json!({ "tags": [{ "name": "Lunch" }] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&updated["tags"]), vec!["Lunch"]);

    let (status, cleared) = app.patch(&url, &token, json!({ "tags": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["tags"].as_array().unwrap().is_empty());
    assert_eq!(names(&cleared["ingredients"]), vec!["Eggs"]);
}

#[tokio::test]
async fn test_invalid_nested_name_does_not_half_apply() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app
        .create_recipe(&token, json!({ "tags": [{ "name": "Keep" }] }))
        .await;
    let url = recipe_url(&recipe["id"]);

    let (status, _) = app
        .patch(
            &url,
            &token,
            json!({ "title": "Changed", "tags": [{ "name": "Fine" }, { "name": "" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, fetched) = app.get(&url, &token).await;
    assert_eq!(fetched["title"], "Sample recipe");
    assert_eq!(names(&fetched["tags"]), vec!["Keep"]);
}

#[tokio::test]
async fn test_null_fields_are_rejected_and_nothing_changes() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app
        .create_recipe(&token, json!({ "tags": [{ "name": "Keep" }] }))
        .await;
    let url = recipe_url(&recipe["id"]);

    let (status, body) = app.patch(&url, &token, json!({ "tags": null })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["tags"][0], "This field may not be null.");

    let (status, body) = app
        .patch(&url, &token, json!({ "title": null, "link": null }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["title"][0], "This field may not be null.");
    assert_eq!(body["fields"]["link"][0], "This field may not be null.");

    let (_, fetched) = app.get(&url, &token).await;
    assert_eq!(fetched["title"], "Sample recipe");
    assert_eq!(names(&fetched["tags"]), vec!["Keep"]);
}

#[tokio::test]
async fn test_unparsable_id_is_not_found() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    for uri in ["/recipes/abc", "/recipes/99999999999999999999"] {
        let (status, body) = app.get(uri, &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found.");
    }

    let (status, _) = app.patch("/recipes/abc", &token, json!({ "title": "x" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/recipes/abc", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_filter_is_rejected() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    let (status, body) = app.get("/recipes?tags=1,x", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["tags"].is_array());
}

#[tokio::test]
async fn test_other_users_recipe_is_not_found() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com").await;
    let intruder = app.signup("intruder@example.com").await;
    let recipe = app.create_recipe(&owner, json!({})).await;
    let url = recipe_url(&recipe["id"]);

    let (status, _) = app.get(&url, &intruder).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.patch(&url, &intruder, json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&url, &intruder).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, fetched) = app.get(&url, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Sample recipe");
}

#[tokio::test]
async fn test_delete_recipe() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app.create_recipe(&token, json!({})).await;
    let url = recipe_url(&recipe["id"]);

    let (status, body) = app.delete(&url, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = app.get(&url, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_filter_by_tags_and_ingredients() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;

    let curry = app
        .create_recipe(
            &token,
            json!({ "title": "Curry", "tags": [{ "name": "Vegan" }], "ingredients": [{ "name": "Rice" }] }),
        )
        .await;
    let salad = app
        .create_recipe(
            &token,
            json!({ "title": "Salad", "tags": [{ "name": "Vegetarian" }] }),
        )
        .await;
    app.create_recipe(&token, json!({ "title": "Fish" })).await;

    let uri = format!(
        "/recipes?tags={},{}",
        curry["tags"][0]["id"], salad["tags"][0]["id"]
    );
    let (status, body) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Salad", "Curry"]);

    let uri = format!("/recipes?ingredients={}", curry["ingredients"][0]["id"]);
    let (_, body) = app.get(&uri, &token).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Curry");

    let (status, body) = app.get("/recipes?tags=1,abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["tags"].is_array());
}

#[tokio::test]
async fn test_upload_image() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app.create_recipe(&token, json!({})).await;
    let url = format!("{}/upload-image", recipe_url(&recipe["id"]));

    let (status, body) = app.upload(&url, &token, "image", &png_bytes()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["id"], recipe["id"]);

    let image_url = body["image"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/media/uploads/recipe/"));
    assert!(image_url.ends_with(".png"));

    let key = image_url.trim_start_matches("/media/");
    assert!(app.images.contains(key).await);

    let (_, fetched) = app.get(&recipe_url(&recipe["id"]), &token).await;
    assert_eq!(fetched["image"], image_url.as_str());
}

#[tokio::test]
async fn test_upload_invalid_image_keeps_previous() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app.create_recipe(&token, json!({})).await;
    let url = format!("{}/upload-image", recipe_url(&recipe["id"]));

    let (status, first) = app.upload(&url, &token, "image", &png_bytes()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.upload(&url, &token, "image", b"notanimage").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["image"].is_array());

    let (status, body) = app.upload(&url, &token, "other", &png_bytes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["image"][0], "No file was submitted.");

    let (_, fetched) = app.get(&recipe_url(&recipe["id"]), &token).await;
    assert_eq!(fetched["image"], first["image"]);
    assert_eq!(app.images.object_count().await, 1);
}

#[tokio::test]
async fn test_upload_to_foreign_recipe_is_not_found() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com").await;
    let intruder = app.signup("intruder@example.com").await;
    let recipe = app.create_recipe(&owner, json!({})).await;
    let url = format!("{}/upload-image", recipe_url(&recipe["id"]));

    let (status, _) = app.upload(&url, &intruder, "image", &png_bytes()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.images.object_count().await, 0);
}

#[tokio::test]
async fn test_upload_over_body_limit_is_payload_too_large() {
    let app = TestApp::new();
    let token = app.signup("user@example.com").await;
    let recipe = app.create_recipe(&token, json!({})).await;
    let url = format!("{}/upload-image", recipe_url(&recipe["id"]));

    let (status, body) = app
        .upload(&url, &token, "image", &vec![0u8; UPLOAD_LIMIT + 1])
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
    assert_eq!(app.images.object_count().await, 0);
}
