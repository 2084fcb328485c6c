// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 120;
pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const MAX_ADVANCE_BOOKING_DAYS: i64 = 90;
pub const PATIENT_CANCELLATION_NOTICE_HOURS: i64 = 2;

/// Status machine and timing rules for appointments.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;

        match current {
            AwaitingAcceptance => &[PaymentPending, Rejected, Cancelled],
            PaymentPending => &[Confirmed, Cancelled],
            Confirmed => &[Completed, Cancelled],
            Completed | Cancelled | Rejected => &[],
        }
    }

    pub fn validate_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !Self::valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidTransition { from: current, to: next });
        }
        Ok(())
    }

    /// Rescheduling is only possible before the appointment is paid for.
    pub fn can_reschedule(status: AppointmentStatus) -> bool {
        matches!(
            status,
            AppointmentStatus::AwaitingAcceptance | AppointmentStatus::PaymentPending
        )
    }

    pub fn validate_duration(duration_minutes: i32) -> Result<(), AppointmentError> {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(AppointmentError::InvalidDuration {
                min: MIN_DURATION_MINUTES,
                max: MAX_DURATION_MINUTES,
            });
        }
        Ok(())
    }

    pub fn validate_booking_time(
        start: DateTime<Utc>,
        duration_minutes: i32,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        Self::validate_duration(duration_minutes)?;

        if start <= now {
            return Err(AppointmentError::InvalidTime(
                "Appointment must be scheduled in the future".to_string(),
            ));
        }
        if start > now + Duration::days(MAX_ADVANCE_BOOKING_DAYS) {
            return Err(AppointmentError::InvalidTime(format!(
                "Appointments can be booked at most {} days ahead",
                MAX_ADVANCE_BOOKING_DAYS
            )));
        }
        Ok(())
    }

    pub fn validate_patient_cancellation(
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if start - now < Duration::hours(PATIENT_CANCELLATION_NOTICE_HOURS) {
            return Err(AppointmentError::CancellationWindow {
                hours: PATIENT_CANCELLATION_NOTICE_HOURS,
            });
        }
        Ok(())
    }

    pub fn validate_completion(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        if now < start {
            return Err(AppointmentError::InvalidTime(
                "Appointment cannot be completed before it starts".to_string(),
            ));
        }
        Ok(())
    }
}
