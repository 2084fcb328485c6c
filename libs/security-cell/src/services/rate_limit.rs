// =====================================================================================
// RATE LIMITER - FIXED WINDOW PER CLIENT AND ROUTE CLASS
// =====================================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{RateLimitClass, SecurityError};

const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub general_per_window: u32,
    pub auth_per_window: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            general_per_window: config.rate_limit_per_minute,
            auth_per_window: config.auth_rate_limit_per_minute,
            window: Duration::from_secs(60),
        }
    }

    fn limit_for(&self, class: RateLimitClass) -> u32 {
        match class {
            RateLimitClass::General => self.general_per_window,
            RateLimitClass::Authentication => self.auth_per_window,
        }
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    started: Instant,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, RateLimitClass), WindowEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `client` and fail once the window is exhausted.
    pub async fn check(&self, client: &str, class: RateLimitClass) -> Result<(), SecurityError> {
        let limit = self.config.limit_for(class);
        let window = self.config.window;
        let now = Instant::now();

        let mut windows = self.windows.lock().await;

        if windows.len() > PURGE_THRESHOLD {
            windows.retain(|_, entry| now.duration_since(entry.started) < window);
        }

        let entry = windows
            .entry((client.to_string(), class))
            .or_insert(WindowEntry { count: 0, started: now });

        if now.duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count >= limit {
            let elapsed = now.duration_since(entry.started);
            let retry_after_seconds = window.saturating_sub(elapsed).as_secs().max(1);
            warn!("Rate limit exceeded for {} ({:?})", client, class);
            return Err(SecurityError::RateLimited { retry_after_seconds });
        }

        entry.count += 1;
        Ok(())
    }

    pub fn classify(path: &str) -> RateLimitClass {
        if path.ends_with("/auth/login") || path.ends_with("/auth/register") {
            RateLimitClass::Authentication
        } else {
            RateLimitClass::General
        }
    }
}

/// First hop of `X-Forwarded-For`, then the socket peer address.
pub fn client_key(request: &Request<Body>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&request);
    let class = RateLimiter::classify(request.uri().path());

    limiter.check(&client, class).await?;
    debug!("Rate limit check passed for {}", client);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn limiter(general: u32, auth: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            general_per_window: general,
            auth_per_window: auth,
            window: Duration::from_secs(60),
        })
    }

    #[tokio::test]
    async fn blocks_after_limit() {
        let limiter = limiter(2, 1);
        assert!(limiter.check("1.2.3.4", RateLimitClass::General).await.is_ok());
        assert!(limiter.check("1.2.3.4", RateLimitClass::General).await.is_ok());
        assert_matches!(
            limiter.check("1.2.3.4", RateLimitClass::General).await,
            Err(SecurityError::RateLimited { retry_after_seconds }) if retry_after_seconds > 0
        );
    }

    #[tokio::test]
    async fn classes_and_clients_are_independent() {
        let limiter = limiter(1, 1);
        assert!(limiter.check("a", RateLimitClass::General).await.is_ok());
        assert!(limiter.check("a", RateLimitClass::Authentication).await.is_ok());
        assert!(limiter.check("b", RateLimitClass::General).await.is_ok());
        assert!(limiter.check("a", RateLimitClass::Authentication).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets() {
        let limiter = limiter(1, 1);
        assert!(limiter.check("a", RateLimitClass::General).await.is_ok());
        assert!(limiter.check("a", RateLimitClass::General).await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("a", RateLimitClass::General).await.is_ok());
    }

    #[test]
    fn classifies_auth_routes() {
        assert_eq!(RateLimiter::classify("/api/v1/auth/login"), RateLimitClass::Authentication);
        assert_eq!(RateLimiter::classify("/api/v1/doctors"), RateLimitClass::General);
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "10.0.0.1");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
