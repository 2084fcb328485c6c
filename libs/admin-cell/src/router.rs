use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_models::auth::UserRole;
use shared_models::error::AppError;
use shared_utils::extractor::{auth_middleware, extract_user, require_role};

use crate::handlers::*;

/// Runs after `auth_middleware`; every admin route needs the admin role.
async fn admin_only(request: Request, next: Next) -> Result<Response, AppError> {
    // `Body` is not `Sync`, so borrow a body-less view across the await.
    let (parts, body) = request.into_parts();
    let head = Request::from_parts(parts, ());
    let user = extract_user(&head).await?;
    require_role(&user, UserRole::Admin)?;
    let (parts, ()) = head.into_parts();
    Ok(next.run(Request::from_parts(parts, body)).await)
}

pub fn admin_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{user_id}/activate", post(activate_user))
        .route("/users/{user_id}/deactivate", post(deactivate_user))
        .route("/doctors/{user_id}/verify", post(verify_doctor))
        .route("/stats", get(platform_stats))
        .route("/backups", get(list_backups).post(create_backup))
        .route("/backups/prune", post(prune_backups))
        .layer(middleware::from_fn(admin_only))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
