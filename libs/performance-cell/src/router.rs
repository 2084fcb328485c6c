use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::get_performance_stats;
use crate::services::CacheService;

pub fn performance_routes(cache: Arc<CacheService>) -> Router {
    Router::new()
        .route("/stats", get(get_performance_stats))
        .with_state(cache)
}
