// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::{DoctorError, DoctorProfile};
use doctor_cell::services::DoctorService;
use notification_cell::{NotificationService, NotificationType};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{User, UserRole};
use shared_utils::extractor::user_uuid;
use video_conferencing_cell::MeetingService;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus, BookAppointmentRequest,
    ConsultationType, RescheduleAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, DEFAULT_DURATION_MINUTES};
use crate::services::refund::RefundProcessor;

const APPOINTMENTS_TABLE: &str = "appointments";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    conflicts: ConflictDetectionService,
    doctors: DoctorService,
    meetings: MeetingService,
    notifications: NotificationService,
    refunds: Option<Arc<dyn RefundProcessor>>,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            conflicts: ConflictDetectionService::new(config),
            doctors: DoctorService::new(config),
            meetings: MeetingService::new(config),
            notifications: NotificationService::new(config),
            refunds: None,
        }
    }

    pub fn with_refunds(mut self, refunds: Arc<dyn RefundProcessor>) -> Self {
        self.refunds = Some(refunds);
        self
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn book_appointment(
        &self,
        user: &User,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = match user.role() {
            Some(UserRole::Patient) => {
                let own_id = user_uuid(user).map_err(|e| AppointmentError::Forbidden(e.to_string()))?;
                if request.patient_id.is_some_and(|id| id != own_id) {
                    return Err(AppointmentError::Forbidden(
                        "Patients can only book appointments for themselves".to_string(),
                    ));
                }
                own_id
            }
            Some(UserRole::Admin) => request.patient_id.ok_or_else(|| {
                AppointmentError::ValidationError("patient_id is required when booking as admin".to_string())
            })?,
            _ => {
                return Err(AppointmentError::Forbidden(
                    "Only patients and administrators can book appointments".to_string(),
                ))
            }
        };

        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        AppointmentLifecycleService::validate_booking_time(request.appointment_date, duration, Utc::now())?;

        let doctor = self.bookable_doctor(request.doctor_id).await?;
        self.ensure_slot_free(&doctor, request.appointment_date, duration, None).await?;

        let now = Utc::now().to_rfc3339();
        let appointment: Appointment = self
            .supabase
            .insert(
                APPOINTMENTS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "patient_id": patient_id,
                    "doctor_id": doctor.user_id,
                    "appointment_date": request.appointment_date.to_rfc3339(),
                    "duration_minutes": duration,
                    "consultation_type": request.consultation_type,
                    "status": AppointmentStatus::AwaitingAcceptance,
                    "reason": request.reason,
                    "fee": doctor.consultation_fee,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(|e| {
                // Two bookings passed the overlap check at the same time.
                if e.is_unique_violation() {
                    AppointmentError::Conflict
                } else {
                    e.into()
                }
            })?;

        info!(
            "Booked appointment {} with doctor {} at {}",
            appointment.id, appointment.doctor_id, appointment.appointment_date
        );

        self.notify(
            appointment.doctor_id,
            NotificationType::AppointmentBooked,
            "New appointment request",
            &format!(
                "A patient requested an appointment on {}",
                appointment.appointment_date.format("%Y-%m-%d %H:%M UTC")
            ),
        )
        .await;

        Ok(appointment)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn reschedule_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id).await?;
        if !appointment.is_participant(user) {
            return Err(AppointmentError::Forbidden(
                "Only participants can reschedule this appointment".to_string(),
            ));
        }
        if !AppointmentLifecycleService::can_reschedule(appointment.status) {
            return Err(AppointmentError::InvalidTransition {
                from: appointment.status,
                to: AppointmentStatus::AwaitingAcceptance,
            });
        }

        let duration = request.duration_minutes.unwrap_or(appointment.duration_minutes);
        AppointmentLifecycleService::validate_booking_time(request.appointment_date, duration, Utc::now())?;

        let doctor = self.bookable_doctor(appointment.doctor_id).await?;
        self.ensure_slot_free(&doctor, request.appointment_date, duration, Some(appointment.id))
            .await?;

        // The doctor has to accept the new time again.
        let mut changes = Map::new();
        changes.insert("appointment_date".into(), json!(request.appointment_date.to_rfc3339()));
        changes.insert("duration_minutes".into(), json!(duration));
        changes.insert("status".into(), json!(AppointmentStatus::AwaitingAcceptance));

        let updated = self
            .guarded_update(&appointment, changes)
            .await
            .map_err(|e| match e {
                AppointmentError::Database(db) if db.is_unique_violation() => AppointmentError::Conflict,
                other => other,
            })?;

        info!("Rescheduled appointment {} to {}", updated.id, updated.appointment_date);

        if appointment.status == AppointmentStatus::PaymentPending {
            self.void_pending_payment(updated.id).await;
        }

        self.notify(
            appointment.counterpart_of(user),
            NotificationType::AppointmentRescheduled,
            "Appointment rescheduled",
            &format!(
                "Your appointment was moved to {}",
                updated.appointment_date.format("%Y-%m-%d %H:%M UTC")
            ),
        )
        .await;

        Ok(updated)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get_appointment(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id).await?;
        if !appointment.is_participant(user) && !user.is_admin() {
            return Err(AppointmentError::Forbidden(
                "Not authorized to view this appointment".to_string(),
            ));
        }
        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        user: &User,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut filters = vec![Self::scope_filter(user)?];

        if let Some(status) = query.status {
            filters.push(format!("status=eq.{}", status));
        }
        if let Some(from) = query.from {
            filters.push(format!("appointment_date=gte.{}", urlencoding::encode(&from.to_rfc3339())));
        }
        if let Some(to) = query.to {
            filters.push(format!("appointment_date=lte.{}", urlencoding::encode(&to.to_rfc3339())));
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        filters.push("order=appointment_date.desc".to_string());
        filters.push(format!("limit={}&offset={}", limit, query.offset.unwrap_or(0)));

        let filters: Vec<String> = filters.into_iter().filter(|f| !f.is_empty()).collect();
        debug!("Listing appointments with {:?}", filters);

        Ok(self.supabase.select(APPOINTMENTS_TABLE, &filters.join("&")).await?)
    }

    pub async fn upcoming_appointments(&self, user: &User, limit: Option<u32>) -> Result<Vec<Appointment>, AppointmentError> {
        let scope = Self::scope_filter(user)?;
        let mut query = format!(
            "status=in.(awaiting_acceptance,payment_pending,confirmed)&appointment_date=gte.{}&order=appointment_date.asc&limit={}",
            urlencoding::encode(&Utc::now().to_rfc3339()),
            limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
        );
        if !scope.is_empty() {
            query = format!("{}&{}", scope, query);
        }

        Ok(self.supabase.select(APPOINTMENTS_TABLE, &query).await?)
    }

    // ==========================================================================
    // STATUS CHANGES
    // ==========================================================================

    pub async fn accept_appointment(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_for_doctor(user, appointment_id).await?;
        let updated = self
            .apply_status(&appointment, AppointmentStatus::PaymentPending, Map::new())
            .await?;

        info!("Doctor accepted appointment {}", updated.id);
        self.notify(
            updated.patient_id,
            NotificationType::AppointmentAccepted,
            "Appointment accepted",
            &format!("Your appointment was accepted. Please pay {:.2} to confirm it.", updated.fee),
        )
        .await;

        Ok(updated)
    }

    pub async fn reject_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_for_doctor(user, appointment_id).await?;

        let mut changes = Map::new();
        changes.insert("cancellation_reason".into(), json!(reason));
        let updated = self
            .apply_status(&appointment, AppointmentStatus::Rejected, changes)
            .await?;

        info!("Doctor rejected appointment {}", updated.id);
        self.notify(
            updated.patient_id,
            NotificationType::AppointmentRejected,
            "Appointment declined",
            reason.as_deref().unwrap_or("The doctor could not take this appointment."),
        )
        .await;

        Ok(updated)
    }

    /// Cancels, then refunds a succeeded payment or voids a pending one and
    /// removes the meeting. Those follow-ups are logged on failure.
    #[instrument(skip(self, user, reason), fields(user_id = %user.id))]
    pub async fn cancel_appointment(
        &self,
        user: &User,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id).await?;
        if !appointment.is_participant(user) && !user.is_admin() {
            return Err(AppointmentError::Forbidden(
                "Not authorized to cancel this appointment".to_string(),
            ));
        }

        AppointmentLifecycleService::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;
        if user.is(&appointment.patient_id) {
            AppointmentLifecycleService::validate_patient_cancellation(appointment.appointment_date, Utc::now())?;
        }

        let mut changes = Map::new();
        changes.insert("cancellation_reason".into(), json!(reason));
        let updated = self
            .apply_status(&appointment, AppointmentStatus::Cancelled, changes)
            .await?;

        info!("Appointment {} cancelled by {}", updated.id, user.id);

        match appointment.status {
            AppointmentStatus::Confirmed => self.refund(updated.id).await,
            AppointmentStatus::PaymentPending => self.void_pending_payment(updated.id).await,
            _ => {}
        }
        if updated.consultation_type == ConsultationType::Online {
            if let Err(e) = self.meetings.delete_for_appointment(updated.id).await {
                warn!("Failed to remove meeting for appointment {}: {}", updated.id, e);
            }
        }

        let message = match &reason {
            Some(reason) => format!("Your appointment was cancelled: {}", reason),
            None => "Your appointment was cancelled.".to_string(),
        };
        if user.is_admin() {
            self.notify(updated.patient_id, NotificationType::AppointmentCancelled, "Appointment cancelled", &message)
                .await;
            self.notify(updated.doctor_id, NotificationType::AppointmentCancelled, "Appointment cancelled", &message)
                .await;
        } else {
            self.notify(
                updated.counterpart_of(user),
                NotificationType::AppointmentCancelled,
                "Appointment cancelled",
                &message,
            )
            .await;
        }

        Ok(updated)
    }

    pub async fn complete_appointment(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_for_doctor(user, appointment_id).await?;
        AppointmentLifecycleService::validate_transition(appointment.status, AppointmentStatus::Completed)?;
        AppointmentLifecycleService::validate_completion(appointment.appointment_date, Utc::now())?;

        let updated = self
            .apply_status(&appointment, AppointmentStatus::Completed, Map::new())
            .await?;

        info!("Appointment {} completed", updated.id);
        self.notify(
            updated.patient_id,
            NotificationType::AppointmentCompleted,
            "Consultation completed",
            "Your consultation is complete. You can now leave a review.",
        )
        .await;

        Ok(updated)
    }

    pub async fn update_notes(
        &self,
        user: &User,
        appointment_id: Uuid,
        notes: String,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_for_doctor(user, appointment_id).await?;

        let mut rows: Vec<Appointment> = self
            .supabase
            .update(
                APPOINTMENTS_TABLE,
                &format!("id=eq.{}", appointment.id),
                json!({ "notes": notes, "updated_at": Utc::now().to_rfc3339() }),
            )
            .await?;

        rows.pop().ok_or(AppointmentError::NotFound)
    }

    /// Called once the payment for an appointment has succeeded. Replays for
    /// an already confirmed appointment return it unchanged.
    #[instrument(skip(self))]
    pub async fn confirm_paid_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id).await?;
        if appointment.status == AppointmentStatus::Confirmed {
            debug!("Appointment {} already confirmed", appointment_id);
            return Ok(appointment);
        }

        let updated = self
            .apply_status(&appointment, AppointmentStatus::Confirmed, Map::new())
            .await?;
        info!("Appointment {} confirmed after payment", updated.id);

        let mut message = format!(
            "Your appointment on {} is confirmed.",
            updated.appointment_date.format("%Y-%m-%d %H:%M UTC")
        );
        if updated.consultation_type == ConsultationType::Online {
            match self
                .meetings
                .create_for_appointment(updated.id, updated.appointment_date, updated.duration_minutes)
                .await
            {
                Ok(_) => message.push_str(" Video consultation details are available in the app."),
                Err(e) => warn!("Failed to create meeting for appointment {}: {}", updated.id, e),
            }
        }

        self.notify(updated.patient_id, NotificationType::AppointmentConfirmed, "Appointment confirmed", &message)
            .await;
        self.notify(updated.doctor_id, NotificationType::AppointmentConfirmed, "Appointment confirmed", &message)
            .await;

        Ok(updated)
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn fetch(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.supabase
            .select_one(APPOINTMENTS_TABLE, &format!("id=eq.{}", appointment_id))
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn fetch_for_doctor(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch(appointment_id).await?;
        if !user.is(&appointment.doctor_id) {
            return Err(AppointmentError::Forbidden(
                "Only the appointment's doctor can do this".to_string(),
            ));
        }
        Ok(appointment)
    }

    /// Role-scoped row filter. Admins see everything.
    fn scope_filter(user: &User) -> Result<String, AppointmentError> {
        match user.role() {
            Some(UserRole::Patient) => Ok(format!("patient_id=eq.{}", user.id)),
            Some(UserRole::Doctor) => Ok(format!("doctor_id=eq.{}", user.id)),
            Some(UserRole::Admin) => Ok(String::new()),
            None => Err(AppointmentError::Forbidden("Unknown role".to_string())),
        }
    }

    async fn bookable_doctor(&self, doctor_id: Uuid) -> Result<DoctorProfile, AppointmentError> {
        let doctor = self.doctors.get_profile(doctor_id).await.map_err(|e| match e {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Database(db) => AppointmentError::Database(db),
            other => AppointmentError::External(other.to_string()),
        })?;

        if !doctor.accepts_bookings() {
            return Err(AppointmentError::DoctorUnavailable);
        }
        Ok(doctor)
    }

    async fn ensure_slot_free(
        &self,
        doctor: &DoctorProfile,
        start: DateTime<Utc>,
        duration: i32,
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if !doctor.covers(start, duration as i64) {
            return Err(AppointmentError::OutsideWorkingHours);
        }
        if self.conflicts.has_conflict(doctor.user_id, start, duration, exclude).await? {
            return Err(AppointmentError::Conflict);
        }
        Ok(())
    }

    /// Moves to `next` only if the row is still in the status we read.
    async fn apply_status(
        &self,
        appointment: &Appointment,
        next: AppointmentStatus,
        mut changes: Map<String, Value>,
    ) -> Result<Appointment, AppointmentError> {
        AppointmentLifecycleService::validate_transition(appointment.status, next)?;
        changes.insert("status".into(), json!(next));
        self.guarded_update(appointment, changes).await
    }

    async fn guarded_update(
        &self,
        appointment: &Appointment,
        mut changes: Map<String, Value>,
    ) -> Result<Appointment, AppointmentError> {
        changes.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}&status=eq.{}", appointment.id, appointment.status);
        let mut rows: Vec<Appointment> = self
            .supabase
            .update(APPOINTMENTS_TABLE, &filter, Value::Object(changes))
            .await?;

        rows.pop().ok_or(AppointmentError::ConcurrentModification)
    }

    async fn refund(&self, appointment_id: Uuid) {
        let Some(refunds) = &self.refunds else {
            warn!("No refund processor configured, appointment {} not refunded", appointment_id);
            return;
        };

        match refunds.refund_for_appointment(appointment_id).await {
            Ok(true) => info!("Refunded payment for appointment {}", appointment_id),
            Ok(false) => debug!("No succeeded payment to refund for appointment {}", appointment_id),
            Err(e) => warn!("Refund for appointment {} failed: {}", appointment_id, e),
        }
    }

    async fn void_pending_payment(&self, appointment_id: Uuid) {
        let Some(refunds) = &self.refunds else {
            warn!("No refund processor configured, pending payment of {} left open", appointment_id);
            return;
        };

        match refunds.void_pending_for_appointment(appointment_id).await {
            Ok(true) => info!("Voided pending payment for appointment {}", appointment_id),
            Ok(false) => debug!("No pending payment to void for appointment {}", appointment_id),
            Err(e) => warn!("Voiding payment for appointment {} failed: {}", appointment_id, e),
        }
    }

    async fn notify(&self, user_id: Uuid, kind: NotificationType, title: &str, message: &str) {
        if let Err(e) = self.notifications.notify(user_id, kind, title, message).await {
            warn!("Failed to notify user {}: {}", user_id, e);
        }
    }
}
