use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn review_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route("/doctors/{doctor_id}", get(get_doctor_reviews));

    let protected_routes = Router::new()
        .route("/", post(create_review))
        .route("/{review_id}", delete(delete_review))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
