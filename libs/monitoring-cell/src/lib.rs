// =====================================================================================
// MONITORING CELL
// =====================================================================================
//
// Request metrics collected by a middleware layer, a liveness check and a
// detailed health report covering the database and the response cache.
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{HealthCheck, HealthStatus, MetricsSnapshot, SystemHealth};
pub use router::monitoring_routes;
pub use handlers::MonitoringHandlers;
pub use services::{metrics_middleware, HealthMonitorService, MetricsCollectorService};
