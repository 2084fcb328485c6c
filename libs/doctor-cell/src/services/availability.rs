use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AvailableSlot, BookedInterval, DoctorError, DoctorProfile};
use crate::services::doctor::DoctorService;

pub const DEFAULT_SLOT_MINUTES: i64 = 30;
pub const MIN_SLOT_MINUTES: i64 = 15;
pub const MAX_SLOT_MINUTES: i64 = 120;

pub struct AvailabilityService {
    supabase: SupabaseClient,
    doctors: DoctorService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    /// Free slots on `date`: working hours minus active appointments.
    pub async fn get_available_slots(
        &self,
        doctor_user_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
    ) -> Result<Vec<AvailableSlot>, DoctorError> {
        let duration = duration_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
        if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&duration) {
            return Err(DoctorError::ValidationError(format!(
                "duration_minutes must be between {} and {}",
                MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
            )));
        }

        let doctor = self.doctors.get_profile(doctor_user_id).await?;
        if !doctor.accepts_bookings() || !doctor.works_on(date) {
            debug!("Doctor {} has no bookable hours on {}", doctor_user_id, date);
            return Ok(Vec::new());
        }

        let booked = self.booked_intervals(doctor_user_id, date).await?;
        let slots = compute_free_slots(&doctor, date, duration, &booked, Utc::now());

        debug!("Found {} free slots for doctor {} on {}", slots.len(), doctor_user_id, date);
        Ok(slots)
    }

    async fn booked_intervals(
        &self,
        doctor_user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, DoctorError> {
        let day_start = date.and_time(NaiveTime::default()).and_utc();
        let day_end = day_start + Duration::days(1);
        // Appointments may start the previous evening and run past midnight.
        let window_start = day_start - Duration::minutes(MAX_SLOT_MINUTES);

        let query = format!(
            "select=appointment_date,duration_minutes&doctor_id=eq.{}&status=not.in.(cancelled,rejected)&appointment_date=gte.{}&appointment_date=lt.{}",
            doctor_user_id,
            urlencoding::encode(&window_start.to_rfc3339()),
            urlencoding::encode(&day_end.to_rfc3339()),
        );

        Ok(self.supabase.select("appointments", &query).await?)
    }
}

/// Slot grid stepping by `duration_minutes` through the working day, dropping
/// slots that already started or overlap a booking.
pub fn compute_free_slots(
    doctor: &DoctorProfile,
    date: NaiveDate,
    duration_minutes: i64,
    booked: &[BookedInterval],
    now: DateTime<Utc>,
) -> Vec<AvailableSlot> {
    let step = Duration::minutes(duration_minutes);
    let day_end = date.and_time(doctor.working_hours_end).and_utc();
    let mut current = date.and_time(doctor.working_hours_start).and_utc();
    let mut slots = Vec::new();

    while current + step <= day_end {
        let slot_end = current + step;
        let taken = booked.iter().any(|b| b.overlaps(current, slot_end));

        if current > now && !taken {
            slots.push(AvailableSlot {
                start_time: current,
                end_time: slot_end,
                duration_minutes,
            });
        }
        current = slot_end;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use shared_utils::test_utils::MockSupabaseResponses;

    fn doctor(start: &str, end: &str) -> DoctorProfile {
        let mut value = MockSupabaseResponses::doctor_profile_response(&Uuid::new_v4().to_string());
        value["working_hours_start"] = json!(start);
        value["working_hours_end"] = json!(end);
        serde_json::from_value(value).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2031, 3, 4, hour, minute, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2031, 3, 4).unwrap()
    }

    #[test]
    fn full_day_without_bookings() {
        let doctor = doctor("09:00:00", "12:00:00");
        let slots = compute_free_slots(&doctor, date(), 30, &[], at(0, 0));

        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].start_time, at(9, 0));
        assert_eq!(slots[5].end_time, at(12, 0));
    }

    #[test]
    fn bookings_remove_overlapping_slots() {
        let doctor = doctor("09:00:00", "12:00:00");
        let booked = vec![BookedInterval {
            appointment_date: at(9, 45),
            duration_minutes: 30,
        }];

        let slots = compute_free_slots(&doctor, date(), 30, &booked, at(0, 0));
        let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();

        assert!(!starts.contains(&at(9, 30)));
        assert!(!starts.contains(&at(10, 0)));
        assert!(starts.contains(&at(9, 0)));
        assert!(starts.contains(&at(10, 30)));
    }

    #[test]
    fn past_slots_are_hidden() {
        let doctor = doctor("09:00:00", "12:00:00");
        let slots = compute_free_slots(&doctor, date(), 60, &[], at(10, 15));

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, at(11, 0));
    }

    #[test]
    fn partial_trailing_slot_is_dropped() {
        let doctor = doctor("09:00:00", "10:45:00");
        let slots = compute_free_slots(&doctor, date(), 30, &[], at(0, 0));

        assert_eq!(slots.len(), 3);
        assert_eq!(slots.last().unwrap().end_time, at(10, 30));
    }

    #[test]
    fn covers_checks_working_window() {
        let doctor = doctor("09:00:00", "17:00:00");
        assert!(doctor.covers(at(9, 0), 30));
        assert!(doctor.covers(at(16, 30), 30));
        assert!(!doctor.covers(at(16, 45), 30));
        assert!(!doctor.covers(at(8, 30), 30));
        assert_eq!(doctor.working_hours_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }
}
