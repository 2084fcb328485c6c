// libs/appointment-cell/src/handlers.rs
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

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, RescheduleAppointmentRequest, StatusChangeRequest,
    UpcomingQuery, UpdateNotesRequest,
};
use crate::services::{AppointmentBookingService, RefundProcessor};

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment requested, waiting for the doctor to accept"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    refunds: Option<Extension<Arc<dyn RefundProcessor>>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let mut booking_service = AppointmentBookingService::new(&state);
    if let Some(Extension(refunds)) = refunds {
        booking_service = booking_service.with_refunds(refunds);
    }
    let appointment = booking_service
        .reschedule_appointment(&user, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_appointments(&user, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.upcoming_appointments(&user, query.limit).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

// ==============================================================================
// STATUS CHANGES
// ==============================================================================

#[axum::debug_handler]
pub async fn accept_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.accept_appointment(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<StatusChangeRequest>>,
) -> Result<Json<Value>, AppError> {
    let reason = request.and_then(|Json(r)| r.reason);

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .reject_appointment(&user, appointment_id, reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    refunds: Option<Extension<Arc<dyn RefundProcessor>>>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<StatusChangeRequest>>,
) -> Result<Json<Value>, AppError> {
    let reason = request.and_then(|Json(r)| r.reason);

    let mut booking_service = AppointmentBookingService::new(&state);
    if let Some(Extension(refunds)) = refunds {
        booking_service = booking_service.with_refunds(refunds);
    }
    let appointment = booking_service
        .cancel_appointment(&user, appointment_id, reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.complete_appointment(&user, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_notes(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_notes(&user, appointment_id, request.notes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment
    })))
}
