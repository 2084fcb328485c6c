// =====================================================================================
// MONITORING CELL HANDLERS
// =====================================================================================

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;
use performance_cell::CacheService;

use crate::models::HealthStatus;
use crate::services::{HealthMonitorService, MetricsCollectorService};

pub struct MonitoringHandlers {
    health_service: HealthMonitorService,
    metrics_service: Arc<MetricsCollectorService>,
}

impl MonitoringHandlers {
    pub fn new(
        config: &AppConfig,
        metrics_service: Arc<MetricsCollectorService>,
        cache: Arc<CacheService>,
    ) -> Self {
        Self {
            health_service: HealthMonitorService::new(config, cache),
            metrics_service,
        }
    }
}

/// Liveness only; never touches dependencies.
#[axum::debug_handler]
pub async fn get_health_status(State(handlers): State<Arc<MonitoringHandlers>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": handlers.health_service.uptime_seconds(),
        "timestamp": Utc::now()
    }))
}

#[axum::debug_handler]
pub async fn get_detailed_health(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> (StatusCode, Json<Value>) {
    let health = handlers.health_service.detailed_health().await;
    let status = match health.overall_status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (
        status,
        Json(json!({
            "success": status == StatusCode::OK,
            "data": health
        })),
    )
}

#[axum::debug_handler]
pub async fn get_current_metrics(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<Value>, AppError> {
    let snapshot = handlers.metrics_service.snapshot().await;

    Ok(Json(json!({
        "success": true,
        "data": snapshot
    })))
}
