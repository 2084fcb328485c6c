use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt;

use crate::models::{ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::services::AccountService;

pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    let response = service.register(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": response
    })))
}

pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    let response = service.login(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": response
    })))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;
    let user = jwt::validate_token(token, &config.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(&headers)?;
    let valid = jwt::validate_token(token, &config.jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

pub async fn get_me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    let profile = service.get_user(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

pub async fn update_me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    let profile = service.update_profile(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

pub async fn change_password(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AccountService::new(&config);
    service.change_password(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password updated"
    })))
}
