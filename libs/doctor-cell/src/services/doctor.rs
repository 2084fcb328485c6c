use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    CreateDoctorRequest, DoctorError, DoctorProfile, DoctorSearchQuery, DoctorSearchResult,
    GeoPoint, UpdateDoctorRequest,
};
use crate::services::geo::{haversine_km, Geocoder, HttpGeocoder};

const DOCTORS_TABLE: &str = "doctor_profiles";
const DEFAULT_RADIUS_KM: f64 = 25.0;
const MAX_PAGE_SIZE: u32 = 100;
const KM_PER_DEGREE_LAT: f64 = 111.0;

pub struct DoctorService {
    supabase: SupabaseClient,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        let geocoder = HttpGeocoder::new(config).map(|g| Arc::new(g) as Arc<dyn Geocoder>);
        Self {
            supabase: SupabaseClient::new(config),
            geocoder,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// New profiles start unverified until an admin approves them.
    #[instrument(skip(self, request))]
    pub async fn create_profile(
        &self,
        user_id: Uuid,
        request: CreateDoctorRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        let start = request
            .working_hours_start
            .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default());
        let end = request
            .working_hours_end
            .unwrap_or_else(|| NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default());
        let working_days = request.working_days.unwrap_or_else(|| vec![1, 2, 3, 4, 5]);

        validate_schedule(start, end, &working_days)?;
        validate_fee(request.consultation_fee)?;
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(DoctorError::ValidationError("Name is required".to_string()));
        }
        if request.license_number.trim().is_empty() {
            return Err(DoctorError::ValidationError("License number is required".to_string()));
        }
        if request.experience_years < 0 {
            return Err(DoctorError::ValidationError(
                "Experience years cannot be negative".to_string(),
            ));
        }

        if self.find_by_user(user_id).await?.is_some() {
            return Err(DoctorError::AlreadyExists);
        }

        let location = match &request.clinic_address {
            Some(address) => self.locate(address).await,
            None => None,
        };

        let now = Utc::now().to_rfc3339();
        let doctor: DoctorProfile = self
            .supabase
            .insert(
                DOCTORS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "user_id": user_id,
                    "first_name": request.first_name.trim(),
                    "last_name": request.last_name.trim(),
                    "specialty": request.specialty.trim(),
                    "license_number": request.license_number.trim(),
                    "experience_years": request.experience_years,
                    "bio": request.bio,
                    "consultation_fee": request.consultation_fee,
                    "languages": request.languages,
                    "clinic_address": request.clinic_address,
                    "latitude": location.map(|p| p.latitude),
                    "longitude": location.map(|p| p.longitude),
                    "is_verified": false,
                    "is_available": true,
                    "rating": 0.0,
                    "review_count": 0,
                    "working_hours_start": start,
                    "working_hours_end": end,
                    "working_days": working_days,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!("Created doctor profile {} for user {}", doctor.id, user_id);
        Ok(doctor)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<DoctorProfile, DoctorError> {
        self.find_by_user(user_id).await?.ok_or(DoctorError::NotFound)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        let current = self.get_profile(user_id).await?;
        let mut changes = Map::new();

        if request.working_hours_start.is_some()
            || request.working_hours_end.is_some()
            || request.working_days.is_some()
        {
            let start = request.working_hours_start.unwrap_or(current.working_hours_start);
            let end = request.working_hours_end.unwrap_or(current.working_hours_end);
            let days = request.working_days.clone().unwrap_or_else(|| current.working_days.clone());
            validate_schedule(start, end, &days)?;

            changes.insert("working_hours_start".to_string(), json!(start));
            changes.insert("working_hours_end".to_string(), json!(end));
            changes.insert("working_days".to_string(), json!(days));
        }

        if let Some(fee) = request.consultation_fee {
            validate_fee(fee)?;
            changes.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(first_name) = request.first_name {
            changes.insert("first_name".to_string(), json!(first_name.trim()));
        }
        if let Some(last_name) = request.last_name {
            changes.insert("last_name".to_string(), json!(last_name.trim()));
        }
        if let Some(specialty) = request.specialty {
            changes.insert("specialty".to_string(), json!(specialty.trim()));
        }
        if let Some(years) = request.experience_years {
            changes.insert("experience_years".to_string(), json!(years));
        }
        if let Some(bio) = request.bio {
            changes.insert("bio".to_string(), json!(bio));
        }
        if let Some(languages) = request.languages {
            changes.insert("languages".to_string(), json!(languages));
        }
        if let Some(is_available) = request.is_available {
            changes.insert("is_available".to_string(), json!(is_available));
        }

        if let Some(address) = request.clinic_address {
            if current.clinic_address.as_deref() != Some(address.as_str()) {
                let location = self.locate(&address).await;
                changes.insert("latitude".to_string(), json!(location.map(|p| p.latitude)));
                changes.insert("longitude".to_string(), json!(location.map(|p| p.longitude)));
            }
            changes.insert("clinic_address".to_string(), json!(address));
        }

        if changes.is_empty() {
            return Ok(current);
        }

        self.patch(user_id, Value::Object(changes)).await
    }

    #[instrument(skip(self))]
    pub async fn set_verified(&self, user_id: Uuid, verified: bool) -> Result<DoctorProfile, DoctorError> {
        let doctor = self.patch(user_id, json!({ "is_verified": verified })).await?;
        info!("Doctor {} verification set to {}", user_id, verified);
        Ok(doctor)
    }

    /// Store a recomputed average rating and review count.
    pub async fn update_rating(
        &self,
        user_id: Uuid,
        rating: f64,
        review_count: i64,
    ) -> Result<DoctorProfile, DoctorError> {
        let rounded = (rating * 100.0).round() / 100.0;
        self.patch(
            user_id,
            json!({ "rating": rounded, "review_count": review_count }),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: DoctorSearchQuery) -> Result<Vec<DoctorSearchResult>, DoctorError> {
        let origin = match (query.near_lat, query.near_lng) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            (None, None) => None,
            _ => {
                return Err(DoctorError::ValidationError(
                    "near_lat and near_lng must be provided together".to_string(),
                ))
            }
        };
        let radius_km = query.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        if radius_km <= 0.0 {
            return Err(DoctorError::ValidationError("radius_km must be positive".to_string()));
        }

        let limit = query.limit.unwrap_or(20).min(MAX_PAGE_SIZE) as usize;
        let offset = query.offset.unwrap_or(0) as usize;

        let mut filters = vec!["order=rating.desc,review_count.desc".to_string()];

        if query.verified_only.unwrap_or(true) {
            filters.push("is_verified=eq.true".to_string());
        }
        if let Some(available) = query.available {
            filters.push(format!("is_available=eq.{}", available));
        }
        if let Some(specialty) = &query.specialty {
            filters.push(format!("specialty=ilike.{}", urlencoding::encode(specialty)));
        }
        if let Some(min_rating) = query.min_rating {
            filters.push(format!("rating=gte.{}", min_rating));
        }
        if let Some(term) = query.name.as_deref().and_then(name_search_term) {
            filters.push(format!(
                "or=(first_name.ilike.*{term}*,last_name.ilike.*{term}*)",
                term = urlencoding::encode(&term)
            ));
        }

        match origin {
            Some(point) => {
                // Narrow to a latitude band, then filter exactly by distance.
                let band = radius_km / KM_PER_DEGREE_LAT;
                filters.push(format!("latitude=gte.{}", point.latitude - band));
                filters.push(format!("latitude=lte.{}", point.latitude + band));
            }
            None => {
                filters.push(format!("limit={}", limit));
                filters.push(format!("offset={}", offset));
            }
        }

        let query_string = filters.join("&");
        debug!("Searching doctors: {}", query_string);
        let doctors: Vec<DoctorProfile> = self.supabase.select(DOCTORS_TABLE, &query_string).await?;

        let results = match origin {
            Some(point) => filter_by_distance(doctors, point, radius_km)
                .into_iter()
                .skip(offset)
                .take(limit)
                .collect(),
            None => doctors
                .into_iter()
                .map(|doctor| DoctorSearchResult { doctor, distance_km: None })
                .collect(),
        };

        Ok(results)
    }

    pub async fn list_specialties(&self) -> Result<Vec<String>, DoctorError> {
        #[derive(Deserialize)]
        struct SpecialtyRow {
            specialty: String,
        }

        let rows: Vec<SpecialtyRow> = self
            .supabase
            .select(DOCTORS_TABLE, "select=specialty&is_verified=eq.true")
            .await?;

        let specialties: BTreeSet<String> = rows.into_iter().map(|r| r.specialty).collect();
        Ok(specialties.into_iter().collect())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<DoctorProfile>, DoctorError> {
        Ok(self
            .supabase
            .select_one(DOCTORS_TABLE, &format!("user_id=eq.{}", user_id))
            .await?)
    }

    async fn patch(&self, user_id: Uuid, mut changes: Value) -> Result<DoctorProfile, DoctorError> {
        if let Some(map) = changes.as_object_mut() {
            map.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let mut rows: Vec<DoctorProfile> = self
            .supabase
            .update(DOCTORS_TABLE, &format!("user_id=eq.{}", user_id), changes)
            .await?;

        if rows.is_empty() {
            return Err(DoctorError::NotFound);
        }
        Ok(rows.swap_remove(0))
    }

    /// Geocoding is best effort; a failed lookup leaves the location empty.
    async fn locate(&self, address: &str) -> Option<GeoPoint> {
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.geocode(address).await {
            Ok(point) => point,
            Err(e) => {
                warn!("Could not geocode clinic address: {}", e);
                None
            }
        }
    }
}

fn validate_schedule(start: NaiveTime, end: NaiveTime, days: &[u32]) -> Result<(), DoctorError> {
    if start >= end {
        return Err(DoctorError::InvalidWorkingHours);
    }
    if days.is_empty() || days.iter().any(|d| !(1..=7).contains(d)) {
        return Err(DoctorError::InvalidWorkingDays);
    }
    Ok(())
}

fn validate_fee(fee: f64) -> Result<(), DoctorError> {
    if fee.is_finite() && fee > 0.0 {
        Ok(())
    } else {
        Err(DoctorError::InvalidFee)
    }
}

/// Keep doctors within `radius_km` of `origin`, nearest first.
pub fn filter_by_distance(
    doctors: Vec<DoctorProfile>,
    origin: GeoPoint,
    radius_km: f64,
) -> Vec<DoctorSearchResult> {
    let mut results: Vec<DoctorSearchResult> = doctors
        .into_iter()
        .filter_map(|doctor| {
            let point = GeoPoint {
                latitude: doctor.latitude?,
                longitude: doctor.longitude?,
            };
            let distance = haversine_km(origin, point);
            (distance <= radius_km).then_some(DoctorSearchResult {
                doctor,
                distance_km: Some((distance * 10.0).round() / 10.0),
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// Keeps the characters a person's name can hold. Anything else could break
/// out of the `or=(...)` filter or act as a wildcard.
fn name_search_term(name: &str) -> Option<String> {
    let term = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(*c, ' ' | '-' | '\''))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!term.is_empty()).then_some(term)
}
