// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::auth::User;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// User id of the patient.
    pub patient_id: Uuid,
    /// User id of the doctor.
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub consultation_type: ConsultationType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub fee: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.appointment_date + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn is_participant(&self, user: &User) -> bool {
        user.is(&self.patient_id) || user.is(&self.doctor_id)
    }

    /// The participant on the other side of `user`.
    pub fn counterpart_of(&self, user: &User) -> Uuid {
        if user.is(&self.patient_id) {
            self.doctor_id
        } else {
            self.patient_id
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    AwaitingAcceptance,
    PaymentPending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Rejected
        )
    }

    /// Whether the appointment still holds its slot in the doctor's calendar.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Rejected)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::AwaitingAcceptance => write!(f, "awaiting_acceptance"),
            AppointmentStatus::PaymentPending => write!(f, "payment_pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    #[default]
    Online,
    InPerson,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    /// Required when an admin books on behalf of a patient.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub consultation_type: ConsultationType,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusChangeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNotesRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<u32>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting bookings")]
    DoctorUnavailable,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Duration must be between {min} and {max} minutes")]
    InvalidDuration { min: i32, max: i32 },

    #[error("Requested time is outside the doctor's working hours")]
    OutsideWorkingHours,

    #[error("The doctor already has an appointment at this time")]
    Conflict,

    #[error("Cannot change appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Patients must cancel at least {hours} hours before the appointment")]
    CancellationWindow { hours: i64 },

    #[error("Appointment was modified by another request")]
    ConcurrentModification,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("External service error: {0}")]
    External(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(error.to_string())
            }
            AppointmentError::DoctorUnavailable
            | AppointmentError::InvalidTime(_)
            | AppointmentError::InvalidDuration { .. }
            | AppointmentError::OutsideWorkingHours
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::CancellationWindow { .. } => AppError::BadRequest(error.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict | AppointmentError::ConcurrentModification => {
                AppError::Conflict(error.to_string())
            }
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::External(msg) => AppError::ExternalService(msg),
            AppointmentError::Database(DbError::UniqueViolation(_)) => {
                AppError::Conflict(AppointmentError::Conflict.to_string())
            }
            AppointmentError::Database(e) => e.into(),
        }
    }
}
