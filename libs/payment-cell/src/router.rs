// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route("/webhook", post(payment_webhook));

    let protected_routes = Router::new()
        .route("/", post(create_payment).get(list_payments))
        .route("/{payment_id}", get(get_payment))
        .route("/{payment_id}/refund", post(refund_payment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
