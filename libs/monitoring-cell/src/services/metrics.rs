// =====================================================================================
// METRICS COLLECTOR SERVICE
// =====================================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::MetricsSnapshot;

/// Latencies kept for the percentile window.
const LATENCY_WINDOW: usize = 1000;

#[derive(Debug)]
pub struct MetricsCollectorService {
    request_count: AtomicU64,
    error_count: AtomicU64,
    client_error_count: AtomicU64,
    total_response_time_ms: AtomicU64,
    response_times: RwLock<VecDeque<u64>>,
    start_time: Instant,
}

impl Default for MetricsCollectorService {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollectorService {
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            client_error_count: AtomicU64::new(0),
            total_response_time_ms: AtomicU64::new(0),
            response_times: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
            start_time: Instant::now(),
        }
    }

    pub async fn record_request(&self, response_time_ms: u64, status: u16) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_ms.fetch_add(response_time_ms, Ordering::Relaxed);

        if status >= 500 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        } else if status >= 400 {
            self.client_error_count.fetch_add(1, Ordering::Relaxed);
        }

        let mut times = self.response_times.write().await;
        if times.len() == LATENCY_WINDOW {
            times.pop_front();
        }
        times.push_back(response_time_ms);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.request_count.load(Ordering::Relaxed);
        let total_errors = self.error_count.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time_ms.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed().as_secs();

        let ratio = |num: f64, den: u64| if den > 0 { num / den as f64 } else { 0.0 };

        let p95_response_time_ms = {
            let times = self.response_times.read().await;
            let mut sorted: Vec<u64> = times.iter().copied().collect();
            sorted.sort_unstable();
            percentile(&sorted, 0.95)
        };

        MetricsSnapshot {
            total_requests,
            total_errors,
            client_errors: self.client_error_count.load(Ordering::Relaxed),
            requests_per_second: ratio(total_requests as f64, uptime),
            average_response_time_ms: ratio(total_response_time as f64, total_requests),
            p95_response_time_ms,
            error_rate_percentage: ratio(total_errors as f64 * 100.0, total_requests),
            uptime_seconds: uptime,
            generated_at: Utc::now(),
        }
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[u64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1] as f64
}

pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsCollectorService>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    debug!("{} -> {} in {}ms", path, status, elapsed_ms);
    metrics.record_request(elapsed_ms, status).await;

    response
}
