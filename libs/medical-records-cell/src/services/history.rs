use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{CreateHistoryEntryRequest, MedicalHistoryEntry, MedicalRecordsError};
use crate::services::access::RecordAccessService;

const HISTORY_TABLE: &str = "medical_history";

pub struct MedicalHistoryService {
    supabase: SupabaseClient,
    access: RecordAccessService,
}

impl MedicalHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            access: RecordAccessService::new(config),
        }
    }

    pub async fn list_history(&self, user: &User, patient_id: Uuid) -> Result<Vec<MedicalHistoryEntry>, MedicalRecordsError> {
        self.access.ensure_can_access(user, patient_id).await?;

        let query = format!("patient_id=eq.{}&order=created_at.desc", patient_id);
        Ok(self.supabase.select(HISTORY_TABLE, &query).await?)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn add_entry(
        &self,
        user: &User,
        patient_id: Uuid,
        request: CreateHistoryEntryRequest,
    ) -> Result<MedicalHistoryEntry, MedicalRecordsError> {
        self.access.ensure_treating_doctor(user, patient_id).await?;

        let diagnosis = request.diagnosis.trim();
        if diagnosis.is_empty() {
            return Err(MedicalRecordsError::ValidationError("Diagnosis cannot be empty".to_string()));
        }
        if let Some(appointment_id) = request.appointment_id {
            self.access
                .ensure_appointment_link(appointment_id, &user.id, patient_id)
                .await?;
        }

        let entry: MedicalHistoryEntry = self
            .supabase
            .insert(
                HISTORY_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "patient_id": patient_id,
                    "doctor_id": user.id,
                    "appointment_id": request.appointment_id,
                    "diagnosis": diagnosis,
                    "treatment": request.treatment,
                    "prescription": request.prescription,
                    "notes": request.notes,
                }),
            )
            .await?;

        info!("Doctor {} added history entry {} for patient {}", user.id, entry.id, patient_id);
        Ok(entry)
    }
}
