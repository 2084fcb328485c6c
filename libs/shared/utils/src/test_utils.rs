use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing every external collaborator at `base_url`.
    pub fn with_base_url(base_url: &str) -> AppConfig {
        let mut config = Self::default().to_app_config();
        config.supabase_url = base_url.to_string();
        config.payment_gateway_url = base_url.to_string();
        config.zoom_api_base_url = base_url.to_string();
        config.zoom_oauth_url = format!("{}/oauth/token", base_url);
        config.email_api_url = format!("{}/email/send", base_url);
        config.sms_api_url = format!("{}/sms/send", base_url);
        config.maps_api_url = format!("{}/maps/geocode", base_url);
        config
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            port: 0,
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_expiry_hours: 24,
            redis_url: None,
            cache_ttl_seconds: 60,
            // 32 zero bytes
            encryption_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string(),
            payment_gateway_url: String::new(),
            payment_gateway_secret_key: "sk_test_123".to_string(),
            payment_webhook_secret: "whsec_test".to_string(),
            payment_currency: "usd".to_string(),
            zoom_api_base_url: String::new(),
            zoom_oauth_url: String::new(),
            zoom_account_id: "zoom-account".to_string(),
            zoom_client_id: "zoom-client".to_string(),
            zoom_client_secret: "zoom-secret".to_string(),
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: "no-reply@test.local".to_string(),
            sms_api_url: String::new(),
            sms_api_key: String::new(),
            maps_api_url: String::new(),
            maps_api_key: String::new(),
            database_url: String::new(),
            backup_dir: String::new(),
            backup_retention_days: 14,
            rate_limit_per_minute: 1000,
            auth_rate_limit_per_minute: 1000,
            max_body_bytes: 1024 * 1024,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "patient")
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test users carry uuid ids")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_response(user_id: &str, email: &str, role: &str, password_hash: &str) -> Value {
        json!({
            "id": user_id,
            "email": email,
            "password_hash": password_hash,
            "role": role,
            "first_name": "Test",
            "last_name": "User",
            "phone": null,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_profile_response(user_id: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "date_of_birth": "1990-01-01",
            "gender": "female",
            "blood_type": "O+",
            "allergies": ["penicillin"],
            "chronic_conditions": [],
            "medications": [],
            "emergency_contact_name": null,
            "emergency_contact_phone": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_profile_response(user_id: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "first_name": "Gregory",
            "last_name": "House",
            "specialty": "General Practice",
            "license_number": "MD123456",
            "experience_years": 10,
            "bio": "Experienced general practitioner",
            "consultation_fee": 150.0,
            "languages": ["English", "Spanish"],
            "clinic_address": "1 Main St",
            "latitude": 40.7128,
            "longitude": -74.0060,
            "is_verified": true,
            "is_available": true,
            "rating": 4.5,
            "review_count": 2,
            "working_hours_start": "00:00:00",
            "working_hours_end": "23:59:00",
            "working_days": [1, 2, 3, 4, 5, 6, 7],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        status: &str,
        appointment_date: DateTime<Utc>,
    ) -> Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": appointment_date.to_rfc3339(),
            "duration_minutes": 30,
            "consultation_type": "online",
            "status": status,
            "reason": "Persistent cough",
            "notes": null,
            "cancellation_reason": null,
            "fee": 150.0,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn payment_response(payment_id: &str, appointment_id: &str, patient_id: &str, status: &str) -> Value {
        json!({
            "id": payment_id,
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "amount": 150.0,
            "currency": "usd",
            "status": status,
            "provider_reference": "pi_test_123",
            "client_secret": "pi_test_123_secret",
            "refunded_amount": 0.0,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn review_response(review_id: &str, appointment_id: &str, patient_id: &str, doctor_id: &str, rating: i32) -> Value {
        json!({
            "id": review_id,
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "rating": rating,
            "comment": "Very helpful",
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn notification_response(notification_id: &str, user_id: &str, is_read: bool) -> Value {
        json!({
            "id": notification_id,
            "user_id": user_id,
            "title": "Appointment update",
            "message": "Your appointment was accepted",
            "notification_type": "appointment_accepted",
            "is_read": is_read,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn zoom_meeting_response(appointment_id: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "meeting_id": "85746065432",
            "join_url": "https://zoom.us/j/85746065432",
            "start_url": "https://zoom.us/s/85746065432?zak=abc",
            "password": "a1b2c3",
            "start_time": "2030-01-01T10:00:00Z",
            "duration_minutes": 30,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_service_key, "test-service-key");
        assert!(!app_config.jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert!(user_model.is_doctor());
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_tokens_validate_with_matching_secret() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert_eq!(token.split('.').count(), 3);
        let decoded = crate::jwt::validate_token(&token, secret).unwrap();
        assert_eq!(decoded.id, user.id);
    }
}
