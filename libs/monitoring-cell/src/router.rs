// =====================================================================================
// MONITORING CELL ROUTER
// =====================================================================================

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::{get_current_metrics, get_detailed_health, get_health_status, MonitoringHandlers};

pub fn monitoring_routes(handlers: Arc<MonitoringHandlers>) -> Router {
    Router::new()
        .route("/health", get(get_health_status))
        .route("/health/detailed", get(get_detailed_health))
        .route("/metrics", get(get_current_metrics))
        .with_state(handlers)
}
