use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{UserListQuery, VerifyDoctorRequest};
use crate::services::{AdminService, BackupService};

// ==============================================================================
// USERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    let admin_service = AdminService::new(&state);
    let users = admin_service.list_users(&query).await?;

    Ok(Json(json!({
        "success": true,
        "data": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn activate_user(
    State(state): State<Arc<AppConfig>>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let admin_service = AdminService::new(&state);
    let user = admin_service.set_user_active(&admin, user_id, true).await?;

    Ok(Json(json!({
        "success": true,
        "data": user
    })))
}

#[axum::debug_handler]
pub async fn deactivate_user(
    State(state): State<Arc<AppConfig>>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let admin_service = AdminService::new(&state);
    let user = admin_service.set_user_active(&admin, user_id, false).await?;

    Ok(Json(json!({
        "success": true,
        "data": user
    })))
}

#[axum::debug_handler]
pub async fn verify_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
    request: Option<Json<VerifyDoctorRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let admin_service = AdminService::new(&state);
    let doctor = admin_service.verify_doctor(user_id, request.verified).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor
    })))
}

// ==============================================================================
// STATS
// ==============================================================================

#[axum::debug_handler]
pub async fn platform_stats(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let admin_service = AdminService::new(&state);
    let stats = admin_service.platform_stats().await?;

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}

// ==============================================================================
// BACKUPS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_backup(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let backup_service = BackupService::new(&state)?;
    let report = backup_service.create_backup().await?;

    Ok(Json(json!({
        "success": true,
        "data": report
    })))
}

#[axum::debug_handler]
pub async fn list_backups(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let backup_service = BackupService::new(&state)?;
    let backups = backup_service.list_backups().await?;

    Ok(Json(json!({
        "success": true,
        "data": backups,
        "total": backups.len()
    })))
}

#[axum::debug_handler]
pub async fn prune_backups(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let backup_service = BackupService::new(&state)?;
    let pruned = backup_service.prune(Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "pruned": pruned
    })))
}
