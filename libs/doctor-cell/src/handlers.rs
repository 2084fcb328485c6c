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
use shared_utils::extractor::{require_role, user_uuid};

use crate::models::{AvailabilityQuery, CreateDoctorRequest, DoctorSearchQuery, UpdateDoctorRequest};
use crate::services::{AvailabilityService, DoctorService};

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctors = doctor_service.search(query).await?;

    Ok(Json(json!({
        "success": true,
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.get_profile(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);
    let slots = availability_service
        .get_available_slots(doctor_id, query.date, query.duration_minutes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    let specialties = doctor_service.list_specialties().await?;

    Ok(Json(json!({
        "success": true,
        "specialties": specialties
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Doctor)?;

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.create_profile(user_uuid(&user)?, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor,
        "message": "Profile created and awaiting verification"
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is(&doctor_id) && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the doctor or an administrator can update this profile".to_string(),
        ));
    }

    let doctor_service = DoctorService::new(&state);
    let doctor = doctor_service.update_profile(doctor_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor
    })))
}
