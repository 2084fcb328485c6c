use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::services::CacheService;

#[axum::debug_handler]
pub async fn get_performance_stats(
    State(cache): State<Arc<CacheService>>,
) -> Result<Json<Value>, AppError> {
    let stats = cache.stats().await;

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}
