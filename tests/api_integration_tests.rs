//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against the memory
//! backend.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use kvcache::{api::create_router, AppState, MemoryCache, MemoryOptions};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    let cache: MemoryCache<Value> = MemoryCache::new(
        MemoryOptions::new()
            .max_entries(100)
            .default_ttl(Duration::from_secs(300))
            .cleanup_interval(Duration::ZERO),
    );
    create_router(AppState::new(cache))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn body_to_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "test_key", "value": "test_value"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_with_ttl() {
    let app = create_test_app();

    let response = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "ttl_key", "value": "ttl_value", "ttl": 60})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let app = create_test_app();

    let value = json!({"name": "ada", "langs": ["rust", "ocaml"]});
    let set_response = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "get_key", "value": value})),
    )
    .await;
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = send(&app, "GET", "/get/get_key", None).await;

    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response).await;
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], value);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = send(&app, "GET", "/get/nonexistent_key", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response).await;
    assert_eq!(json["error"], "cache: key not found");
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();

    let set_response = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "delete_key", "value": "delete_value"})),
    )
    .await;
    assert_eq!(set_response.status(), StatusCode::OK);

    let del_response = send(&app, "DELETE", "/del/delete_key", None).await;
    assert_eq!(del_response.status(), StatusCode::OK);

    let get_response = send(&app, "GET", "/get/delete_key", None).await;
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_absent_key_succeeds() {
    let app = create_test_app();

    let response = send(&app, "DELETE", "/del/nonexistent_key", None).await;

    assert_eq!(response.status(), StatusCode::OK);
}

// == HAS / CLEAR Endpoint Tests ==

#[tokio::test]
async fn test_has_and_clear_endpoints() {
    let app = create_test_app();

    for key in ["a", "b"] {
        send(&app, "PUT", "/set", Some(json!({"key": key, "value": 1}))).await;
    }

    let json = body_to_json(send(&app, "GET", "/has/a", None).await).await;
    assert_eq!(json["exists"], true);

    let clear_response = send(&app, "DELETE", "/clear", None).await;
    assert_eq!(clear_response.status(), StatusCode::OK);

    for key in ["a", "b"] {
        let json = body_to_json(send(&app, "GET", &format!("/has/{}", key), None).await).await;
        assert_eq!(json["exists"], false);
    }
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "stats_key", "value": "stats_value"})),
    )
    .await;
    // Hit then miss
    send(&app, "GET", "/get/stats_key", None).await;
    send(&app, "GET", "/get/nonexistent", None).await;

    let response = send(&app, "GET", "/stats", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;

    assert_eq!(json["hits"].as_u64().unwrap(), 1);
    assert_eq!(json["misses"].as_u64().unwrap(), 1);
    assert_eq!(json["total_entries"].as_u64().unwrap(), 1);
    assert!(json.get("hit_rate").is_some());
}

#[tokio::test]
async fn test_capacity_eviction_visible_in_stats() {
    let cache: MemoryCache<Value> = MemoryCache::new(
        MemoryOptions::new()
            .max_entries(2)
            .cleanup_interval(Duration::ZERO),
    );
    let app = create_router(AppState::new(cache));

    for key in ["a", "b", "c"] {
        send(&app, "PUT", "/set", Some(json!({"key": key, "value": key}))).await;
    }

    assert_eq!(
        send(&app, "GET", "/get/a", None).await.status(),
        StatusCode::NOT_FOUND
    );
    let json = body_to_json(send(&app, "GET", "/stats", None).await).await;
    assert_eq!(json["evictions"].as_u64().unwrap(), 1);
    assert_eq!(json["total_entries"].as_u64().unwrap(), 2);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = send(&app, "GET", "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;
    assert_eq!(json["status"].as_str().unwrap(), "healthy");
    assert_eq!(json["backend"].as_str().unwrap(), "memory");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum returns 400 or 422 for JSON parsing errors
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let response = send(&app, "PUT", "/set", Some(json!({"key": "", "value": "test"}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_closed_cache_returns_service_unavailable() {
    let cache: MemoryCache<Value> =
        MemoryCache::new(MemoryOptions::new().cleanup_interval(Duration::ZERO));
    cache.close().await.unwrap();
    let app = create_router(AppState::new(cache));

    let response = send(&app, "PUT", "/set", Some(json!({"key": "k", "value": 1}))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    let set_response = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "ttl_test", "value": "expires_soon", "ttl": 1})),
    )
    .await;
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = send(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(get_response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let get_response = send(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_negative_ttl_never_expires() {
    let cache: MemoryCache<Value> = MemoryCache::new(
        MemoryOptions::new()
            .default_ttl(Duration::from_millis(10))
            .cleanup_interval(Duration::ZERO),
    );
    let app = create_router(AppState::new(cache));

    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "pinned", "value": true, "ttl": -1})),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = send(&app, "GET", "/get/pinned", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_max_ttl_is_accepted_and_stored() {
    let app = create_test_app();

    let set_response = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "long_lived", "value": "v", "ttl": i64::MAX})),
    )
    .await;
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = send(&app, "GET", "/get/long_lived", None).await;
    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response).await;
    assert_eq!(json["value"], "v");
}
