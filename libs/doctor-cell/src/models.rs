use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    pub license_number: String,
    pub experience_years: i32,
    pub bio: Option<String>,
    pub consultation_fee: f64,
    #[serde(default)]
    pub languages: Vec<String>,
    pub clinic_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_verified: bool,
    pub is_available: bool,
    pub rating: f64,
    pub review_count: i32,
    pub working_hours_start: NaiveTime,
    pub working_hours_end: NaiveTime,
    /// ISO weekdays, 1 = Monday .. 7 = Sunday.
    pub working_days: Vec<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn works_on(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday().number_from_monday())
    }

    /// Whether `[start, start + duration)` sits inside one working day.
    pub fn covers(&self, start: DateTime<Utc>, duration_minutes: i64) -> bool {
        let end = start + Duration::minutes(duration_minutes);
        start.date_naive() == end.date_naive()
            && self.works_on(start.date_naive())
            && start.time() >= self.working_hours_start
            && end.time() <= self.working_hours_end
    }

    pub fn accepts_bookings(&self) -> bool {
        self.is_verified && self.is_available
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSearchResult {
    #[serde(flatten)]
    pub doctor: DoctorProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    pub license_number: String,
    pub experience_years: i32,
    pub bio: Option<String>,
    pub consultation_fee: f64,
    #[serde(default)]
    pub languages: Vec<String>,
    pub clinic_address: Option<String>,
    pub working_hours_start: Option<NaiveTime>,
    pub working_hours_end: Option<NaiveTime>,
    pub working_days: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialty: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    pub languages: Option<Vec<String>>,
    pub clinic_address: Option<String>,
    pub is_available: Option<bool>,
    pub working_hours_start: Option<NaiveTime>,
    pub working_hours_end: Option<NaiveTime>,
    pub working_days: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    pub name: Option<String>,
    pub min_rating: Option<f64>,
    pub available: Option<bool>,
    pub verified_only: Option<bool>,
    pub near_lat: Option<f64>,
    pub near_lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// An appointment that blocks part of a doctor's day.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedInterval {
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl BookedInterval {
    pub fn end(&self) -> DateTime<Utc> {
        self.appointment_date + Duration::minutes(self.duration_minutes)
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end() && end > self.appointment_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("A doctor profile already exists for this user")]
    AlreadyExists,

    #[error("Invalid working hours: start must be before end")]
    InvalidWorkingHours,

    #[error("Invalid working days: use 1 (Monday) to 7 (Sunday)")]
    InvalidWorkingDays,

    #[error("Consultation fee must be positive")]
    InvalidFee,

    #[error("{0}")]
    ValidationError(String),

    #[error("Geocoding failed: {0}")]
    Geocoding(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<DoctorError> for AppError {
    fn from(error: DoctorError) -> Self {
        match error {
            DoctorError::NotFound => AppError::NotFound(error.to_string()),
            DoctorError::AlreadyExists => AppError::Conflict(error.to_string()),
            DoctorError::InvalidWorkingHours
            | DoctorError::InvalidWorkingDays
            | DoctorError::InvalidFee
            | DoctorError::ValidationError(_) => AppError::ValidationError(error.to_string()),
            DoctorError::Geocoding(msg) => AppError::ExternalService(msg),
            DoctorError::Database(DbError::UniqueViolation(_)) => AppError::Conflict(
                "A doctor with this user or license number already exists".to_string(),
            ),
            DoctorError::Database(e) => e.into(),
        }
    }
}
