// libs/video-conferencing-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// STORED MEETINGS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomMeeting {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub meeting_id: String,
    pub join_url: String,
    pub start_url: String,
    pub password: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
}

/// What a participant is allowed to see of a meeting.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingAccess {
    pub appointment_id: Uuid,
    pub meeting_id: String,
    pub join_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    pub password: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl MeetingAccess {
    pub fn for_patient(meeting: ZoomMeeting) -> Self {
        Self::build(meeting, false)
    }

    pub fn for_host(meeting: ZoomMeeting) -> Self {
        Self::build(meeting, true)
    }

    fn build(meeting: ZoomMeeting, host: bool) -> Self {
        Self {
            appointment_id: meeting.appointment_id,
            meeting_id: meeting.meeting_id,
            join_url: meeting.join_url,
            start_url: host.then_some(meeting.start_url),
            password: meeting.password,
            start_time: meeting.start_time,
            duration_minutes: meeting.duration_minutes,
        }
    }
}

/// Participants of the appointment a meeting belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentParticipants {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_type: String,
}

// ==============================================================================
// ZOOM API PAYLOADS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct CreateMeetingParams {
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoomCreateMeetingRequest {
    pub topic: String,
    /// 2 = scheduled meeting
    #[serde(rename = "type")]
    pub meeting_type: u8,
    pub start_time: String,
    pub duration: i32,
    pub timezone: String,
    pub settings: ZoomMeetingSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoomMeetingSettings {
    pub join_before_host: bool,
    pub waiting_room: bool,
    pub host_video: bool,
    pub participant_video: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoomCreatedMeeting {
    pub id: u64,
    pub join_url: String,
    pub start_url: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoomTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum VideoConferencingError {
    #[error("No meeting exists for this appointment")]
    MeetingNotFound,

    #[error("Appointment not found")]
    InvalidAppointment,

    #[error("User not authorized for this meeting")]
    Unauthorized,

    #[error("Zoom API error: {message}")]
    ZoomApiError { message: String },

    #[error("Video conferencing not configured")]
    NotConfigured,

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<VideoConferencingError> for AppError {
    fn from(error: VideoConferencingError) -> Self {
        match error {
            VideoConferencingError::MeetingNotFound | VideoConferencingError::InvalidAppointment => {
                AppError::NotFound(error.to_string())
            }
            VideoConferencingError::Unauthorized => AppError::Forbidden(error.to_string()),
            VideoConferencingError::ZoomApiError { message } => AppError::ExternalService(message),
            VideoConferencingError::NotConfigured => AppError::Internal(error.to_string()),
            VideoConferencingError::Database(e) => e.into(),
        }
    }
}
