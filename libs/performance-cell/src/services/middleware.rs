use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{OriginalUri, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::models::CachedResponse;
use crate::services::cache::CacheService;

pub const CACHE_STATUS_HEADER: &str = "x-cache";
const MAX_CACHEABLE_BYTES: usize = 1024 * 1024;

/// State for [`response_cache_middleware`]. Entries are grouped by scope so a
/// write under one router clears only that router's cached reads.
#[derive(Clone)]
pub struct ResponseCache {
    pub cache: Arc<CacheService>,
    pub scope: String,
}

impl ResponseCache {
    pub fn new(cache: Arc<CacheService>, scope: impl Into<String>) -> Self {
        Self {
            cache,
            scope: scope.into(),
        }
    }

    fn prefix(&self) -> String {
        format!("http_cache:{}:", self.scope)
    }

    fn key_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.prefix(), path_and_query)
    }
}

fn with_cache_status(mut response: Response, status: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    response
}

/// Bodies of unknown length are treated as too large.
fn fits_in_cache(response: &Response) -> bool {
    let declared = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared.is_some_and(|len| len > MAX_CACHEABLE_BYTES as u64) {
        return false;
    }

    response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_CACHEABLE_BYTES as u64)
}

/// Caches anonymous `GET` responses and drops the scope on successful writes.
pub async fn response_cache_middleware(
    State(state): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();

    if method != Method::GET {
        let response = next.run(request).await;
        if response.status().is_success() {
            state.cache.invalidate_prefix(&state.prefix()).await;
        }
        return response;
    }

    // Personalised responses are never shared
    if request.headers().contains_key(header::AUTHORIZATION) {
        return with_cache_status(next.run(request).await, "BYPASS");
    }

    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let key = state.key_for(&path_and_query);

    if let Some(raw) = state.cache.get(&key).await {
        match serde_json::from_str::<CachedResponse>(&raw) {
            Ok(cached) => {
                debug!("Cache hit for {}", key);
                let response = (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, cached.content_type)],
                    cached.body,
                )
                    .into_response();
                return with_cache_status(response, "HIT");
            }
            Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
        }
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("application/json") {
        return response;
    }

    if !fits_in_cache(&response) {
        debug!("Response for {} too large to cache", key);
        return with_cache_status(response, "BYPASS");
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHEABLE_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to buffer response for caching: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read response body").into_response();
        }
    };

    match String::from_utf8(bytes.to_vec()) {
        Ok(body) => {
            let cached = CachedResponse { content_type, body };
            match serde_json::to_string(&cached) {
                Ok(raw) => state.cache.set(&key, &raw, None).await,
                Err(e) => warn!("Failed to serialize cache entry {}: {}", key, e),
            }
        }
        Err(_) => debug!("Skipping non UTF-8 body for {}", key),
    }

    with_cache_status(Response::from_parts(parts, Body::from(bytes)), "MISS")
}
