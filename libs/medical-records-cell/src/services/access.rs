use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{User, UserRole};

use crate::models::MedicalRecordsError;

/// Decides who may read and write a patient's records: the patient, admins,
/// and doctors with a confirmed or completed appointment with the patient.
pub struct RecordAccessService {
    supabase: SupabaseClient,
}

impl RecordAccessService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn ensure_can_access(&self, user: &User, patient_id: Uuid) -> Result<(), MedicalRecordsError> {
        match user.role() {
            Some(UserRole::Admin) => Ok(()),
            Some(UserRole::Patient) if user.is(&patient_id) => Ok(()),
            Some(UserRole::Doctor) => self.ensure_treating_doctor(user, patient_id).await,
            _ => Err(MedicalRecordsError::AccessDenied(
                "Not allowed to access this patient's records".to_string(),
            )),
        }
    }

    pub async fn ensure_treating_doctor(&self, user: &User, patient_id: Uuid) -> Result<(), MedicalRecordsError> {
        if !user.is_doctor() {
            return Err(MedicalRecordsError::AccessDenied(
                "Only doctors can perform this action".to_string(),
            ));
        }

        let query = format!(
            "select=id&doctor_id=eq.{}&patient_id=eq.{}&status=in.(confirmed,completed)&limit=1",
            user.id, patient_id
        );
        let rows: Vec<Value> = self.supabase.select("appointments", &query).await?;
        debug!("Doctor {} has {} qualifying appointments with {}", user.id, rows.len(), patient_id);

        if rows.is_empty() {
            return Err(MedicalRecordsError::AccessDenied(
                "Doctors can only access records of patients they treat".to_string(),
            ));
        }
        Ok(())
    }

    /// The appointment must be between this doctor and patient.
    pub async fn ensure_appointment_link(
        &self,
        appointment_id: Uuid,
        doctor_id: &str,
        patient_id: Uuid,
    ) -> Result<(), MedicalRecordsError> {
        let query = format!(
            "select=id&id=eq.{}&doctor_id=eq.{}&patient_id=eq.{}",
            appointment_id, doctor_id, patient_id
        );
        let row: Option<Value> = self.supabase.select_one("appointments", &query).await?;
        row.map(|_| ()).ok_or_else(|| {
            MedicalRecordsError::ValidationError("Appointment does not belong to this doctor and patient".to_string())
        })
    }
}
