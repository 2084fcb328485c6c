use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use security_cell::ValidationService;

use crate::models::{
    CreatePatientRequest, PatientError, PatientProfile, PatientSearchQuery, UpdatePatientRequest,
    BLOOD_TYPES,
};

const PATIENTS_TABLE: &str = "patient_profiles";
const MAX_PAGE_SIZE: u32 = 100;

pub struct PatientService {
    supabase: SupabaseClient,
    validator: ValidationService,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            validator: ValidationService::with_default_config(),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn create_profile(
        &self,
        user_id: Uuid,
        request: CreatePatientRequest,
    ) -> Result<PatientProfile, PatientError> {
        self.validate_date_of_birth(request.date_of_birth)?;
        self.validate_blood_type(request.blood_type.as_deref())?;
        self.validate_phone(request.emergency_contact_phone.as_deref())?;

        if self.find_by_user(user_id).await?.is_some() {
            return Err(PatientError::AlreadyExists);
        }

        let now = Utc::now().to_rfc3339();
        let profile: PatientProfile = self
            .supabase
            .insert(
                PATIENTS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "user_id": user_id,
                    "date_of_birth": request.date_of_birth,
                    "gender": request.gender,
                    "blood_type": request.blood_type,
                    "allergies": request.allergies,
                    "chronic_conditions": request.chronic_conditions,
                    "medications": request.medications,
                    "emergency_contact_name": request.emergency_contact_name,
                    "emergency_contact_phone": request.emergency_contact_phone,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!("Created patient profile {} for user {}", profile.id, user_id);
        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<PatientProfile, PatientError> {
        self.find_by_user(user_id).await?.ok_or(PatientError::NotFound)
    }

    /// Patients see themselves, admins see everyone, doctors see patients they have
    /// an appointment with.
    pub async fn ensure_can_view(&self, viewer: &User, patient_user_id: Uuid) -> Result<(), PatientError> {
        if viewer.is(&patient_user_id) || viewer.is_admin() {
            return Ok(());
        }

        if viewer.is_doctor() {
            let query = format!(
                "doctor_id=eq.{}&patient_id=eq.{}&select=id&limit=1",
                viewer.id, patient_user_id
            );
            let rows: Vec<Value> = self.supabase.select("appointments", &query).await?;
            if !rows.is_empty() {
                return Ok(());
            }
        }

        Err(PatientError::Unauthorized)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<PatientProfile, PatientError> {
        let mut changes = Map::new();

        if let Some(date_of_birth) = request.date_of_birth {
            self.validate_date_of_birth(date_of_birth)?;
            changes.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(blood_type) = request.blood_type {
            self.validate_blood_type(Some(&blood_type))?;
            changes.insert("blood_type".to_string(), json!(blood_type));
        }
        if let Some(phone) = request.emergency_contact_phone {
            self.validate_phone(Some(&phone))?;
            changes.insert("emergency_contact_phone".to_string(), json!(phone));
        }
        if let Some(gender) = request.gender {
            changes.insert("gender".to_string(), json!(gender));
        }
        if let Some(allergies) = request.allergies {
            changes.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(conditions) = request.chronic_conditions {
            changes.insert("chronic_conditions".to_string(), json!(conditions));
        }
        if let Some(medications) = request.medications {
            changes.insert("medications".to_string(), json!(medications));
        }
        if let Some(name) = request.emergency_contact_name {
            changes.insert("emergency_contact_name".to_string(), json!(name));
        }

        if changes.is_empty() {
            return self.get_profile(user_id).await;
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut rows: Vec<PatientProfile> = self
            .supabase
            .update(PATIENTS_TABLE, &format!("user_id=eq.{}", user_id), Value::Object(changes))
            .await?;

        if rows.is_empty() {
            return Err(PatientError::NotFound);
        }

        info!("Updated patient profile for user {}", user_id);
        Ok(rows.swap_remove(0))
    }

    pub async fn search(&self, query: PatientSearchQuery) -> Result<Vec<PatientProfile>, PatientError> {
        let mut filters = vec!["order=created_at.desc".to_string()];

        if let Some(blood_type) = query.blood_type {
            filters.push(format!("blood_type=eq.{}", urlencoding::encode(&blood_type)));
        }
        if let Some(gender) = query.gender {
            filters.push(format!("gender=eq.{}", urlencoding::encode(&gender)));
        }
        if let Some(condition) = query.condition {
            let literal = format!("{{\"{}\"}}", condition.replace('"', ""));
            filters.push(format!("chronic_conditions=cs.{}", urlencoding::encode(&literal)));
        }

        let limit = query.limit.unwrap_or(20).min(MAX_PAGE_SIZE);
        filters.push(format!("limit={}", limit));
        filters.push(format!("offset={}", query.offset.unwrap_or(0)));

        let query_string = filters.join("&");
        debug!("Searching patients: {}", query_string);

        Ok(self.supabase.select(PATIENTS_TABLE, &query_string).await?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>, PatientError> {
        Ok(self
            .supabase
            .select_one(PATIENTS_TABLE, &format!("user_id=eq.{}", user_id))
            .await?)
    }

    fn validate_date_of_birth(&self, date_of_birth: chrono::NaiveDate) -> Result<(), PatientError> {
        let today = Utc::now().date_naive();
        match today.years_since(date_of_birth) {
            Some(age) if age <= 150 && date_of_birth <= today => Ok(()),
            _ => Err(PatientError::InvalidDateOfBirth),
        }
    }

    fn validate_blood_type(&self, blood_type: Option<&str>) -> Result<(), PatientError> {
        match blood_type {
            Some(value) if !BLOOD_TYPES.contains(&value) => {
                Err(PatientError::InvalidBloodType(value.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn validate_phone(&self, phone: Option<&str>) -> Result<(), PatientError> {
        match phone {
            Some(value) if !self.validator.validate_phone(value) => Err(PatientError::InvalidPhone),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate};
    use shared_utils::test_utils::TestConfig;

    fn service() -> PatientService {
        PatientService::new(&TestConfig::default().to_app_config())
    }

    #[test]
    fn rejects_future_birth_dates() {
        let tomorrow = Utc::now().date_naive() + Duration::days(1);
        assert_matches!(
            service().validate_date_of_birth(tomorrow),
            Err(PatientError::InvalidDateOfBirth)
        );
        assert!(service()
            .validate_date_of_birth(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap())
            .is_ok());
    }

    #[test]
    fn blood_type_must_be_known() {
        assert!(service().validate_blood_type(Some("AB-")).is_ok());
        assert!(service().validate_blood_type(None).is_ok());
        assert_matches!(
            service().validate_blood_type(Some("C+")),
            Err(PatientError::InvalidBloodType(_))
        );
    }
}
