use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientProfile {
    pub fn age(&self) -> u32 {
        let today = Utc::now().date_naive();
        today.years_since(self.date_of_birth).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePatientRequest {
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<Vec<String>>,
    pub chronic_conditions: Option<Vec<String>>,
    pub medications: Option<Vec<String>>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    pub blood_type: Option<String>,
    pub gender: Option<String>,
    /// Matches patients listing this chronic condition.
    pub condition: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub const BLOOD_TYPES: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient profile not found")]
    NotFound,

    #[error("A patient profile already exists for this user")]
    AlreadyExists,

    #[error("Invalid date of birth")]
    InvalidDateOfBirth,

    #[error("Invalid blood type: {0}")]
    InvalidBloodType(String),

    #[error("Invalid emergency contact phone")]
    InvalidPhone,

    #[error("Not allowed to access this patient profile")]
    Unauthorized,

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<PatientError> for AppError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::NotFound => AppError::NotFound(error.to_string()),
            PatientError::AlreadyExists => AppError::Conflict(error.to_string()),
            PatientError::InvalidDateOfBirth
            | PatientError::InvalidBloodType(_)
            | PatientError::InvalidPhone => AppError::ValidationError(error.to_string()),
            PatientError::Unauthorized => AppError::Forbidden(error.to_string()),
            PatientError::Database(DbError::UniqueViolation(_)) => {
                AppError::Conflict("A patient profile already exists for this user".to_string())
            }
            PatientError::Database(e) => e.into(),
        }
    }
}
