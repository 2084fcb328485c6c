use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AppointmentParticipants, CreateMeetingParams, VideoConferencingError, ZoomMeeting};
use crate::services::zoom::{ZoomApi, ZoomClient};

const MEETINGS_TABLE: &str = "zoom_meetings";
const APPOINTMENTS_TABLE: &str = "appointments";

pub struct MeetingService {
    supabase: SupabaseClient,
    zoom: Option<Arc<dyn ZoomApi>>,
}

impl MeetingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            zoom: ZoomClient::shared(config),
        }
    }

    pub fn with_zoom(mut self, zoom: Arc<dyn ZoomApi>) -> Self {
        self.zoom = Some(zoom);
        self
    }

    fn zoom(&self) -> Result<&Arc<dyn ZoomApi>, VideoConferencingError> {
        self.zoom.as_ref().ok_or(VideoConferencingError::NotConfigured)
    }

    /// Returns the existing meeting when one was already created for the appointment.
    #[instrument(skip(self))]
    pub async fn create_for_appointment(
        &self,
        appointment_id: Uuid,
        start_time: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<ZoomMeeting, VideoConferencingError> {
        if let Some(existing) = self.find(appointment_id).await? {
            debug!("Meeting already exists for appointment {}", appointment_id);
            return Ok(existing);
        }

        let created = self
            .zoom()?
            .create_meeting(CreateMeetingParams {
                topic: format!("Medical consultation {}", appointment_id),
                start_time,
                duration_minutes,
            })
            .await?;

        let row = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "meeting_id": created.id.to_string(),
            "join_url": created.join_url,
            "start_url": created.start_url,
            "password": created.password,
            "start_time": start_time.to_rfc3339(),
            "duration_minutes": duration_minutes,
            "created_at": Utc::now().to_rfc3339(),
        });

        match self.supabase.insert::<ZoomMeeting>(MEETINGS_TABLE, row).await {
            Ok(meeting) => {
                info!("Stored Zoom meeting {} for appointment {}", meeting.meeting_id, appointment_id);
                Ok(meeting)
            }
            Err(e) if e.is_unique_violation() => {
                // Lost a race with a concurrent confirmation; drop our duplicate.
                warn!("Concurrent meeting creation for appointment {}", appointment_id);
                if let Err(e) = self.zoom()?.delete_meeting(&created.id.to_string()).await {
                    warn!("Failed to clean up duplicate Zoom meeting {}: {}", created.id, e);
                }
                self.get_for_appointment(appointment_id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<ZoomMeeting, VideoConferencingError> {
        self.find(appointment_id)
            .await?
            .ok_or(VideoConferencingError::MeetingNotFound)
    }

    /// Deletes the Zoom meeting and its row. A missing meeting is not an error.
    #[instrument(skip(self))]
    pub async fn delete_for_appointment(&self, appointment_id: Uuid) -> Result<(), VideoConferencingError> {
        let Some(meeting) = self.find(appointment_id).await? else {
            return Ok(());
        };

        self.zoom()?.delete_meeting(&meeting.meeting_id).await?;
        self.supabase
            .delete(MEETINGS_TABLE, &format!("appointment_id=eq.{}", appointment_id))
            .await?;

        info!("Removed meeting {} for appointment {}", meeting.meeting_id, appointment_id);
        Ok(())
    }

    pub async fn get_participants(
        &self,
        appointment_id: Uuid,
    ) -> Result<AppointmentParticipants, VideoConferencingError> {
        let query = format!(
            "id=eq.{}&select=id,patient_id,doctor_id,consultation_type",
            appointment_id
        );
        self.supabase
            .select_one(APPOINTMENTS_TABLE, &query)
            .await?
            .ok_or(VideoConferencingError::InvalidAppointment)
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Option<ZoomMeeting>, VideoConferencingError> {
        let query = format!("appointment_id=eq.{}", appointment_id);
        Ok(self.supabase.select_one(MEETINGS_TABLE, &query).await?)
    }
}
