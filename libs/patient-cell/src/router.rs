use std::sync::Arc;

use axum::{middleware, routing::{get, post}, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(create_patient))
        .route("/me", get(get_my_profile))
        .route("/search", get(search_patients))
        .route("/{user_id}", get(get_patient).put(update_patient))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
