use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::models::BookedInterval;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::AppointmentError;
use crate::services::lifecycle::MAX_DURATION_MINUTES;

pub struct ConflictDetectionService {
    supabase: SupabaseClient,
}

impl ConflictDetectionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Whether `[start, start + duration)` overlaps an active appointment of
    /// the doctor. `exclude` skips the appointment being rescheduled.
    pub async fn has_conflict(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i32,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let end = start + Duration::minutes(duration_minutes as i64);
        // Earlier appointments can still be running when this one starts.
        let window_start = start - Duration::minutes(MAX_DURATION_MINUTES as i64);

        let mut query = format!(
            "select=appointment_date,duration_minutes&doctor_id=eq.{}&status=not.in.(cancelled,rejected)&appointment_date=gte.{}&appointment_date=lt.{}",
            doctor_id,
            urlencoding::encode(&window_start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );
        if let Some(id) = exclude {
            query.push_str(&format!("&id=neq.{}", id));
        }

        let booked: Vec<BookedInterval> = self.supabase.select("appointments", &query).await?;
        let conflict = booked.iter().any(|b| b.overlaps(start, end));

        if conflict {
            warn!("Conflict detected for doctor {} at {}", doctor_id, start);
        } else {
            debug!("No conflict for doctor {} at {} ({} nearby bookings)", doctor_id, start, booked.len());
        }
        Ok(conflict)
    }
}
