// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Cancellation refunds need an `Extension<Arc<dyn RefundProcessor>>` layered
/// on top by the caller.
pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/accept", post(handlers::accept_appointment))
        .route("/{appointment_id}/reject", post(handlers::reject_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/notes", put(handlers::update_notes))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
