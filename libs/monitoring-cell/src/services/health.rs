// =====================================================================================
// HEALTH MONITORING SERVICE
// =====================================================================================

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{instrument, warn};

use performance_cell::CacheService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{HealthCheck, HealthStatus, SystemHealth};

/// A database round trip slower than this reports as degraded.
const SLOW_DATABASE_MS: u64 = 2000;

pub struct HealthMonitorService {
    start_time: Instant,
    supabase: SupabaseClient,
    cache: Arc<CacheService>,
}

impl HealthMonitorService {
    pub fn new(config: &AppConfig, cache: Arc<CacheService>) -> Self {
        Self {
            start_time: Instant::now(),
            supabase: SupabaseClient::new(config),
            cache,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    #[instrument(skip(self))]
    pub async fn detailed_health(&self) -> SystemHealth {
        let (database, cache) = tokio::join!(self.check_database(), self.check_cache());
        let components = vec![database, cache];

        SystemHealth {
            overall_status: overall_status(&components),
            uptime_seconds: self.uptime_seconds(),
            components,
            timestamp: Utc::now(),
        }
    }

    async fn check_database(&self) -> HealthCheck {
        let start = Instant::now();
        let result = self.supabase.health_check().await;
        let elapsed = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => HealthCheck {
                component: "database".to_string(),
                status: if elapsed > SLOW_DATABASE_MS {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                },
                response_time_ms: elapsed,
                last_checked: Utc::now(),
                error_message: None,
            },
            Err(e) => {
                warn!("Database health check failed: {}", e);
                HealthCheck {
                    component: "database".to_string(),
                    status: HealthStatus::Unhealthy,
                    response_time_ms: elapsed,
                    last_checked: Utc::now(),
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    async fn check_cache(&self) -> HealthCheck {
        let start = Instant::now();
        let result = self.cache.ping().await;
        let elapsed = start.elapsed().as_millis() as u64;

        // The in-memory fallback keeps serving, so a Redis outage only degrades
        let (status, error_message) = match result {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                warn!("Cache health check failed: {}", e);
                (HealthStatus::Degraded, Some(e.to_string()))
            }
        };

        HealthCheck {
            component: "cache".to_string(),
            status,
            response_time_ms: elapsed,
            last_checked: Utc::now(),
            error_message,
        }
    }
}

fn overall_status(checks: &[HealthCheck]) -> HealthStatus {
    if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
