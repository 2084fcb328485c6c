use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        .route("/change-password", post(handlers::change_password))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
