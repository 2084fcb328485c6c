// =====================================================================================
// MONITORING CELL MODELS
// =====================================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub last_checked: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub uptime_seconds: u64,
    pub components: Vec<HealthCheck>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    /// Responses with a 5xx status.
    pub total_errors: u64,
    pub client_errors: u64,
    pub requests_per_second: f64,
    pub average_response_time_ms: f64,
    pub p95_response_time_ms: f64,
    pub error_rate_percentage: f64,
    pub uptime_seconds: u64,
    pub generated_at: DateTime<Utc>,
}
