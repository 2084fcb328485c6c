use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::{require_any_role, require_role, user_uuid};

use crate::models::{CreatePatientRequest, PatientError, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Patient)?;

    let service = PatientService::new(&config);
    let profile = service.create_profile(user_uuid(&user)?, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Patient)?;

    let service = PatientService::new(&config);
    let profile = service.get_profile(user_uuid(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile,
        "age": profile.age()
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    service.ensure_can_view(&user, patient_id).await?;
    let profile = service.get_profile(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is(&patient_id) && !user.is_admin() {
        return Err(PatientError::Unauthorized.into());
    }

    let service = PatientService::new(&config);
    let profile = service.update_profile(patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[UserRole::Admin, UserRole::Doctor])?;

    let service = PatientService::new(&config);
    let patients = service.search(query).await?;

    Ok(Json(json!({
        "success": true,
        "patients": patients,
        "total": patients.len()
    })))
}
