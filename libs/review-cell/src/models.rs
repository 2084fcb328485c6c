use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::AppointmentStatus;
use shared_database::DbError;
use shared_models::error::AppError;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub appointment_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RatingRow {
    pub rating: i32,
}

/// Average over all of a doctor's ratings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[i32]) -> Self {
        if ratings.is_empty() {
            return Self { average: 0.0, count: 0 };
        }
        let total: i64 = ratings.iter().map(|r| *r as i64).sum();
        Self {
            average: total as f64 / ratings.len() as f64,
            count: ratings.len() as i64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Review not found")]
    NotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Only completed appointments can be reviewed, this one is {0}")]
    NotReviewable(AppointmentStatus),

    #[error("This appointment has already been reviewed")]
    AlreadyReviewed,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<ReviewError> for AppError {
    fn from(error: ReviewError) -> Self {
        match error {
            ReviewError::NotFound | ReviewError::AppointmentNotFound => AppError::NotFound(error.to_string()),
            ReviewError::InvalidRating => AppError::ValidationError(error.to_string()),
            ReviewError::NotReviewable(_) => AppError::BadRequest(error.to_string()),
            ReviewError::AlreadyReviewed => AppError::Conflict(error.to_string()),
            ReviewError::Forbidden(msg) => AppError::Forbidden(msg),
            ReviewError::Database(DbError::UniqueViolation(_)) => {
                AppError::Conflict(ReviewError::AlreadyReviewed.to_string())
            }
            ReviewError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_no_ratings_is_zero() {
        assert_eq!(RatingSummary::from_ratings(&[]), RatingSummary { average: 0.0, count: 0 });
    }

    #[test]
    fn summary_averages_ratings() {
        let summary = RatingSummary::from_ratings(&[5, 4, 4]);
        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.333).abs() < 0.001);
    }
}
