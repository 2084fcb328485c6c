use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers::{validate_input, validate_password, SecurityHandlers};

/// Public helpers used by registration forms.
pub fn create_security_router() -> Router {
    let handlers = Arc::new(SecurityHandlers::new());

    Router::new()
        .route("/validate", post(validate_input))
        .route("/password/validate", post(validate_password))
        .with_state(handlers)
}
