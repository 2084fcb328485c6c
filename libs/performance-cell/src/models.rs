use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub backend: CacheBackendKind,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub stores: u64,
    pub invalidations: u64,
    /// Live entries in the in-process fallback.
    pub memory_entries: usize,
    pub default_ttl_seconds: u64,
    pub generated_at: DateTime<Utc>,
}

/// A cached `200 OK` JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PerformanceError {
    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PerformanceError> for AppError {
    fn from(error: PerformanceError) -> Self {
        AppError::Internal(error.to_string())
    }
}
