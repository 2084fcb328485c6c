use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::user_uuid;

use crate::models::NotificationListQuery;
use crate::services::NotificationService;

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let notifications = notification_service.list(user_uuid(&user)?, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications,
        "total": notifications.len()
    })))
}

#[axum::debug_handler]
pub async fn unread_count(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let count = notification_service.unread_count(user_uuid(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "unread_count": count
    })))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let notification = notification_service
        .mark_read(user_uuid(&user)?, notification_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notification
    })))
}

#[axum::debug_handler]
pub async fn mark_all_read(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    let updated = notification_service.mark_all_read(user_uuid(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "updated": updated
    })))
}

#[axum::debug_handler]
pub async fn delete_notification(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification_service = NotificationService::new(&state);
    notification_service
        .delete(user_uuid(&user)?, notification_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Notification deleted"
    })))
}
