use std::sync::Arc;

use axum::{extract::Extension, middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

use admin_cell::admin_routes;
use appointment_cell::{appointment_routes, RefundProcessor};
use auth_cell::auth_routes;
use doctor_cell::doctor_routes;
use medical_records_cell::medical_records_routes;
use monitoring_cell::{metrics_middleware, monitoring_routes, MetricsCollectorService, MonitoringHandlers};
use notification_cell::notification_routes;
use patient_cell::patient_routes;
use payment_cell::{payment_routes, PaymentService};
use performance_cell::{performance_routes, response_cache_middleware, CacheService, ResponseCache};
use review_cell::review_routes;
use security_cell::{create_security_router, rate_limit_middleware, RateLimitConfig, RateLimiter};
use shared_config::AppConfig;
use video_conferencing_cell::video_conferencing_routes;

/// Anonymous catalogue reads share one cache scope. Bookings, reviews and
/// admin verification change what the catalogue shows, so writes through
/// those routers clear it.
const CATALOGUE_SCOPE: &str = "catalogue";

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let cache = Arc::new(CacheService::new(&state));
    let metrics = Arc::new(MetricsCollectorService::new());
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from_app_config(&state)));
    let monitoring = Arc::new(MonitoringHandlers::new(&state, metrics.clone(), cache.clone()));

    let catalogue = ResponseCache::new(cache.clone(), CATALOGUE_SCOPE);
    let cached = |router: Router| {
        router.layer(middleware::from_fn_with_state(catalogue.clone(), response_cache_middleware))
    };

    // Cancellation refunds go through the payment service
    let refunds: Arc<dyn RefundProcessor> = Arc::new(PaymentService::new(&state));

    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", cached(doctor_routes(state.clone())))
        .nest(
            "/appointments",
            cached(appointment_routes(state.clone())).layer(Extension(refunds)),
        )
        .nest("/payments", payment_routes(state.clone()))
        .nest("/video", video_conferencing_routes(state.clone()))
        .nest("/medical-records", medical_records_routes(state.clone()))
        .nest("/reviews", cached(review_routes(state.clone())))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/admin", cached(admin_routes(state.clone())))
        .nest("/security", create_security_router())
        .nest("/monitoring", monitoring_routes(monitoring))
        .nest("/performance", performance_routes(cache));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Medibook API is running!" }))
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
}
