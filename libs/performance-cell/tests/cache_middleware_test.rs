use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, Request, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use performance_cell::{performance_routes, response_cache_middleware, CacheService, ResponseCache};

#[derive(Clone)]
struct Counter(Arc<AtomicUsize>);

async fn list_doctors(State(counter): State<Counter>) -> Json<Value> {
    let calls = counter.0.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "success": true, "calls": calls }))
}

async fn create_doctor() -> StatusCode {
    StatusCode::CREATED
}

const LARGE_BODY_BYTES: usize = 2 * 1024 * 1024;

async fn full_catalogue(State(counter): State<Counter>) -> Json<Value> {
    counter.0.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": true, "data": "x".repeat(LARGE_BODY_BYTES) }))
}

async fn missing() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn app(cache: Arc<CacheService>, counter: Counter) -> Router {
    Router::new()
        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/catalogue", get(full_catalogue))
        .route("/missing", get(missing))
        .with_state(counter)
        .layer(middleware::from_fn_with_state(
            ResponseCache::new(cache, "catalogue"),
            response_cache_middleware,
        ))
}

fn fixture() -> (Router, Arc<CacheService>, Counter) {
    let cache = Arc::new(CacheService::in_memory(Duration::from_secs(60)));
    let counter = Counter(Arc::new(AtomicUsize::new(0)));
    (app(cache.clone(), counter.clone()), cache, counter)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let cache_status = response
        .headers()
        .get("x-cache")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cache_status, body)
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let (app, _, counter) = fixture();

    let (status, cache_status, body) = send(&app, "GET", "/doctors?specialty=cardiology", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert_eq!(body["calls"], 1);

    let (status, cache_status, body) = send(&app, "GET", "/doctors?specialty=cardiology", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status.as_deref(), Some("HIT"));
    assert_eq!(body["calls"], 1);
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn query_string_is_part_of_the_key() {
    let (app, _, counter) = fixture();

    send(&app, "GET", "/doctors?page=1", None).await;
    let (_, cache_status, _) = send(&app, "GET", "/doctors?page=2", None).await;

    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn successful_write_invalidates_scope() {
    let (app, cache, counter) = fixture();

    send(&app, "GET", "/doctors", None).await;
    let (status, _, _) = send(&app, "POST", "/doctors", None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, cache_status, body) = send(&app, "GET", "/doctors", None).await;
    assert_eq!(cache_status.as_deref(), Some("MISS"));
    assert_eq!(body["calls"], 2);
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().await.invalidations, 1);
}

#[tokio::test]
async fn authenticated_reads_bypass_cache() {
    let (app, _, counter) = fixture();

    send(&app, "GET", "/doctors", Some("token")).await;
    let (_, cache_status, _) = send(&app, "GET", "/doctors", Some("token")).await;

    assert_eq!(cache_status.as_deref(), Some("BYPASS"));
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn error_responses_are_not_cached() {
    let (app, cache, _) = fixture();

    let (status, cache_status, _) = send(&app, "GET", "/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(cache_status, None);
    assert_eq!(cache.stats().await.stores, 0);
}

#[tokio::test]
async fn oversized_response_passes_through_uncached() {
    let (app, cache, counter) = fixture();

    for _ in 0..2 {
        let (status, cache_status, body) = send(&app, "GET", "/catalogue", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache_status.as_deref(), Some("BYPASS"));
        assert_eq!(body["data"].as_str().map(str::len), Some(LARGE_BODY_BYTES));
    }

    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().await.stores, 0);
}

#[tokio::test]
async fn stats_endpoint_reports_counters() {
    let (app, cache, _) = fixture();
    send(&app, "GET", "/doctors", None).await;
    send(&app, "GET", "/doctors", None).await;

    let router = performance_routes(cache);
    let (status, _, body) = send(&router, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["backend"], "memory");
    assert_eq!(body["data"]["hits"], 1);
    assert_eq!(body["data"]["misses"], 1);
    assert_eq!(body["data"]["stores"], 1);
}
