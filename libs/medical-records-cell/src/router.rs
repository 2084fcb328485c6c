use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::MAX_DOCUMENT_BYTES;

/// Base64 inflates uploads by a third, plus room for the JSON envelope.
const MAX_UPLOAD_BODY_BYTES: usize = MAX_DOCUMENT_BYTES / 3 * 4 + 64 * 1024;

pub fn medical_records_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/{patient_id}/documents",
            get(handlers::list_documents).post(handlers::upload_document),
        )
        .route(
            "/{patient_id}/documents/{document_id}",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .route(
            "/{patient_id}/history",
            get(handlers::list_history).post(handlers::add_history_entry),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
