use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn notification_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/unread-count", get(handlers::unread_count))
        .route("/read-all", post(handlers::mark_all_read))
        .route("/{notification_id}/read", post(handlers::mark_read))
        .route("/{notification_id}", delete(handlers::delete_notification))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
