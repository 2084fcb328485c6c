use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentStatus};
use doctor_cell::services::DoctorService;
use notification_cell::{NotificationService, NotificationType};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_utils::extractor::user_uuid;

use crate::models::{
    CreateReviewRequest, RatingRow, RatingSummary, Review, ReviewError, ReviewListQuery, MAX_RATING, MIN_RATING,
};

const REVIEWS_TABLE: &str = "reviews";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub struct ReviewService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    notifications: NotificationService,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            notifications: NotificationService::new(config),
        }
    }

    /// One review per completed appointment, written by its patient.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn create_review(&self, user: &User, request: CreateReviewRequest) -> Result<Review, ReviewError> {
        if !user.is_patient() {
            return Err(ReviewError::Forbidden("Only patients can write reviews".to_string()));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&request.rating) {
            return Err(ReviewError::InvalidRating);
        }

        let appointment: Appointment = self
            .supabase
            .select_one("appointments", &format!("id=eq.{}", request.appointment_id))
            .await?
            .ok_or(ReviewError::AppointmentNotFound)?;

        if !user.is(&appointment.patient_id) {
            return Err(ReviewError::Forbidden(
                "You can only review your own appointments".to_string(),
            ));
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(ReviewError::NotReviewable(appointment.status));
        }

        let patient_id = user_uuid(user).map_err(|e| ReviewError::Forbidden(e.to_string()))?;
        let comment = request
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let review: Review = self
            .supabase
            .insert(
                REVIEWS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "appointment_id": appointment.id,
                    "patient_id": patient_id,
                    "doctor_id": appointment.doctor_id,
                    "rating": request.rating,
                    "comment": comment,
                }),
            )
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    ReviewError::AlreadyReviewed
                } else {
                    ReviewError::Database(e)
                }
            })?;

        info!("Review {} created for doctor {}", review.id, review.doctor_id);
        self.refresh_rating(review.doctor_id).await;

        if let Err(e) = self
            .notifications
            .notify(
                review.doctor_id,
                NotificationType::ReviewReceived,
                "New review",
                &format!("A patient rated your consultation {} out of {}.", review.rating, MAX_RATING),
            )
            .await
        {
            warn!("Failed to notify doctor {} of review: {}", review.doctor_id, e);
        }

        Ok(review)
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid, query: &ReviewListQuery) -> Result<Vec<Review>, ReviewError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let filter = format!(
            "doctor_id=eq.{}&order=created_at.desc&limit={}&offset={}",
            doctor_id,
            limit,
            query.offset.unwrap_or(0)
        );
        Ok(self.supabase.select(REVIEWS_TABLE, &filter).await?)
    }

    pub async fn rating_summary(&self, doctor_id: Uuid) -> Result<RatingSummary, ReviewError> {
        let rows: Vec<RatingRow> = self
            .supabase
            .select(REVIEWS_TABLE, &format!("select=rating&doctor_id=eq.{}", doctor_id))
            .await?;
        let ratings: Vec<i32> = rows.into_iter().map(|r| r.rating).collect();
        Ok(RatingSummary::from_ratings(&ratings))
    }

    /// Authors and admins only.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete_review(&self, user: &User, review_id: Uuid) -> Result<(), ReviewError> {
        let review: Review = self
            .supabase
            .select_one(REVIEWS_TABLE, &format!("id=eq.{}", review_id))
            .await?
            .ok_or(ReviewError::NotFound)?;

        if !user.is_admin() && !user.is(&review.patient_id) {
            return Err(ReviewError::Forbidden(
                "Only the author or an admin can delete a review".to_string(),
            ));
        }

        self.supabase
            .delete(REVIEWS_TABLE, &format!("id=eq.{}", review.id))
            .await?;
        info!("Review {} deleted", review.id);

        self.refresh_rating(review.doctor_id).await;
        Ok(())
    }

    async fn refresh_rating(&self, doctor_id: Uuid) {
        let summary = match self.rating_summary(doctor_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to load ratings of doctor {}: {}", doctor_id, e);
                return;
            }
        };

        if let Err(e) = self
            .doctors
            .update_rating(doctor_id, summary.average, summary.count)
            .await
        {
            warn!("Failed to store rating of doctor {}: {}", doctor_id, e);
        }
    }
}
