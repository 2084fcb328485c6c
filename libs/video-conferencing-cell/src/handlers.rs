// libs/video-conferencing-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{MeetingAccess, VideoConferencingError};
use crate::services::MeetingService;

/// Join details for the meeting of an appointment. The doctor also receives
/// the host start URL.
#[axum::debug_handler]
pub async fn get_appointment_meeting(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let meeting_service = MeetingService::new(&state);
    let participants = meeting_service.get_participants(appointment_id).await?;

    let is_host = user.is(&participants.doctor_id);
    if !is_host && !user.is(&participants.patient_id) && !user.is_admin() {
        return Err(VideoConferencingError::Unauthorized.into());
    }

    let meeting = meeting_service.get_for_appointment(appointment_id).await?;
    let access = if is_host {
        MeetingAccess::for_host(meeting)
    } else {
        MeetingAccess::for_patient(meeting)
    };

    Ok(Json(json!({
        "success": true,
        "data": access
    })))
}

pub async fn video_health_check(State(state): State<Arc<AppConfig>>) -> Json<Value> {
    let configured = state.is_video_conferencing_configured();

    Json(json!({
        "status": if configured { "healthy" } else { "not_configured" },
        "video_configured": configured,
        "provider": "zoom"
    }))
}
