//! HTTP Route Tests
//!
//! Drives the full application (path normalization, CORS, tracing,
//! fallback) with
//! `tower::ServiceExt::oneshot`, one fresh in-memory engine per test.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use hbnb::http_server::{build_router, App, HttpServerConfig};
use hbnb::storage::{MemoryBackend, StorageEngine};
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Utilities
// =============================================================================

fn app() -> App {
    let engine = StorageEngine::open(Box::new(MemoryBackend::new())).unwrap();
    build_router(&HttpServerConfig::default(), Arc::new(engine))
}

async fn send(app: &App, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn send_raw(app: &App, method: Method, uri: &str, content_type: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn create_state(app: &App, name: &str) -> String {
    let (status, body) = send(app, Method::POST, "/api/v1/states", Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_user(app: &App) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/users",
        Some(json!({"email": "a@b.c", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_city(app: &App, state_id: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/v1/states/{}/cities", state_id),
        Some(json!({"name": name})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_place(app: &App, city_id: &str, user_id: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/v1/cities/{}/places", city_id),
        Some(json!({"user_id": user_id, "name": "Loft"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_create_state_returns_created_entity() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/states", Some(json!({"name": "California"}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "California");
    assert_eq!(body["__class__"], "State");
    assert!(body["id"].is_string());
    assert!(body["created_at"].is_string());
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn test_create_state_without_name() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/states", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing name");
}

#[tokio::test]
async fn test_get_unknown_state() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/states/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_create_under_unknown_parent_is_not_found_before_validation() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/v1/states/unknown/cities", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        send_raw(&app, Method::POST, "/api/v1/states/unknown/cities", "application/json", "nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_city_keeps_parent() {
    let app = app();
    let state_id = create_state(&app, "California").await;
    let city_id = create_city(&app, &state_id, "Los Angeles").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/cities/{}", city_id),
        Some(json!({"state_id": "other", "name": "Fresno"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state_id"], state_id.as_str());
    assert_eq!(body["name"], "Fresno");

    let (_, body) = send(&app, Method::GET, &format!("/api/v1/cities/{}", city_id), None).await;
    assert_eq!(body["name"], "Fresno");
}

#[tokio::test]
async fn test_delete_review_twice() {
    let app = app();
    let state_id = create_state(&app, "California").await;
    let city_id = create_city(&app, &state_id, "San Francisco").await;
    let user_id = create_user(&app).await;

    let (status, place) = send(
        &app,
        Method::POST,
        &format!("/api/v1/cities/{}/places", city_id),
        Some(json!({"user_id": user_id, "name": "Loft"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let place_id = place["id"].as_str().unwrap();

    let (status, review) = send(
        &app,
        Method::POST,
        &format!("/api/v1/places/{}/reviews", place_id),
        Some(json!({"user_id": user_id, "text": "Great"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["place_id"], place_id);
    let uri = format!("/api/v1/reviews/{}", review["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Validation Order
// =============================================================================

#[tokio::test]
async fn test_place_reports_first_missing_field() {
    let app = app();
    let state_id = create_state(&app, "Nevada").await;
    let city_id = create_city(&app, &state_id, "Reno").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/cities/{}/places", city_id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing user_id");
}

#[tokio::test]
async fn test_place_with_unknown_user() {
    let app = app();
    let state_id = create_state(&app, "Nevada").await;
    let city_id = create_city(&app, &state_id, "Reno").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/cities/{}/places", city_id),
        Some(json!({"user_id": "ghost", "name": "Cabin"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, places) = send(&app, Method::GET, &format!("/api/v1/cities/{}/places", city_id), None).await;
    assert_eq!(places, json!([]));
}

#[tokio::test]
async fn test_malformed_bodies() {
    let app = app();
    let (status, body) = send_raw(&app, Method::POST, "/api/v1/states", "application/json", "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not a JSON");

    let (status, body) = send_raw(&app, Method::POST, "/api/v1/states", "text/plain", r#"{"name": "x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not a JSON");

    let state_id = create_state(&app, "Oregon").await;
    let (status, body) = send_raw(
        &app,
        Method::PUT,
        &format!("/api/v1/states/{}", state_id),
        "application/json",
        "[1]",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not a JSON");
}

#[tokio::test]
async fn test_review_reports_missing_text() {
    let app = app();
    let state_id = create_state(&app, "Nevada").await;
    let city_id = create_city(&app, &state_id, "Reno").await;
    let user_id = create_user(&app).await;
    let place_id = create_place(&app, &city_id, &user_id).await;
    let uri = format!("/api/v1/places/{}/reviews", place_id);

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({"text": "Nice"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing user_id");

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({"user_id": user_id}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing text");
}

#[tokio::test]
async fn test_review_with_unknown_user() {
    let app = app();
    let state_id = create_state(&app, "Nevada").await;
    let city_id = create_city(&app, &state_id, "Reno").await;
    let user_id = create_user(&app).await;
    let place_id = create_place(&app, &city_id, &user_id).await;
    let uri = format!("/api/v1/places/{}/reviews", place_id);

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({"user_id": "ghost", "text": "Nice"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (_, reviews) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(reviews, json!([]));
}

// =============================================================================
// Foreign Keys Are Fixed After Create
// =============================================================================

#[tokio::test]
async fn test_update_place_keeps_city_and_owner() {
    let app = app();
    let state_id = create_state(&app, "Nevada").await;
    let city_id = create_city(&app, &state_id, "Reno").await;
    let other_city = create_city(&app, &state_id, "Vegas").await;
    let user_id = create_user(&app).await;
    let place_id = create_place(&app, &city_id, &user_id).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/places/{}", place_id),
        Some(json!({"city_id": other_city, "user_id": "someone-else", "max_guest": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city_id"], city_id.as_str());
    assert_eq!(body["user_id"], user_id.as_str());
    assert_eq!(body["max_guest"], 4);

    let (_, moved) = send(&app, Method::GET, &format!("/api/v1/cities/{}/places", other_city), None).await;
    assert_eq!(moved, json!([]));
}

#[tokio::test]
async fn test_update_review_keeps_place_and_author() {
    let app = app();
    let state_id = create_state(&app, "Nevada").await;
    let city_id = create_city(&app, &state_id, "Reno").await;
    let user_id = create_user(&app).await;
    let place_id = create_place(&app, &city_id, &user_id).await;
    let other_place = create_place(&app, &city_id, &user_id).await;

    let (status, review) = send(
        &app,
        Method::POST,
        &format!("/api/v1/places/{}/reviews", place_id),
        Some(json!({"user_id": user_id, "text": "Great"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let review_id = review["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/reviews/{}", review_id),
        Some(json!({"place_id": other_place, "user_id": "someone-else", "text": "Okay"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["place_id"], place_id.as_str());
    assert_eq!(body["user_id"], user_id.as_str());
    assert_eq!(body["text"], "Okay");
}

// =============================================================================
// Listing, Rendering, Index Routes
// =============================================================================

#[tokio::test]
async fn test_trailing_slash_reaches_same_route() {
    let app = app();
    let state_id = create_state(&app, "Utah").await;

    let (status, states) = send(&app, Method::GET, "/api/v1/states/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(states.as_array().unwrap().len(), 1);

    let (status, state) = send(&app, Method::GET, &format!("/api/v1/states/{}/", state_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["name"], "Utah");

    let (status, _) = send(&app, Method::POST, "/api/v1/states/", Some(json!({"name": "Idaho"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/api/v1/status/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));
}


#[tokio::test]
async fn test_list_children_only_of_parent() {
    let app = app();
    let ca = create_state(&app, "California").await;
    let nv = create_state(&app, "Nevada").await;
    create_city(&app, &ca, "Los Angeles").await;
    create_city(&app, &ca, "San Diego").await;
    create_city(&app, &nv, "Reno").await;

    let (status, cities) = send(&app, Method::GET, &format!("/api/v1/states/{}/cities", ca), None).await;
    assert_eq!(status, StatusCode::OK);
    let cities = cities.as_array().unwrap();
    assert_eq!(cities.len(), 2);
    assert!(cities.iter().all(|c| c["state_id"] == ca.as_str()));

    let (status, _) = send(&app, Method::GET, "/api/v1/states/unknown/cities", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, states) = send(&app, Method::GET, "/api/v1/states", None).await;
    assert_eq!(states.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_user_password_never_rendered() {
    let app = app();
    let (status, user) = send(
        &app,
        Method::POST,
        "/api/v1/users",
        Some(json!({"email": "a@b.c", "password": "secret", "first_name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(user.get("password").is_none());
    assert_eq!(user["first_name"], "Ada");

    let (status, body) = send(&app, Method::POST, "/api/v1/users", Some(json!({"password": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing email");
}

#[tokio::test]
async fn test_status_and_stats() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));

    create_state(&app, "Utah").await;
    create_user(&app).await;
    let (status, body) = send(&app, Method::GET, "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"cities": 0, "places": 0, "reviews": 0, "states": 1, "users": 1})
    );
}

#[tokio::test]
async fn test_unmatched_route_is_json_404() {
    let app = app();
    for uri in ["/nowhere", "/api/v1/nowhere", "/api/v1/states/x/y/z"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "Not found");
    }
}
