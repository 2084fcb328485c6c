use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::UserRole;
use shared_utils::jwt::issue_token;
use security_cell::{PasswordSecurityService, ValidationService};

use crate::models::{
    AuthError, AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest,
    UpdateProfileRequest, UserProfile, UserRecord,
};

const USERS_TABLE: &str = "users";

pub struct AccountService {
    supabase: SupabaseClient,
    validator: ValidationService,
    jwt_secret: String,
    jwt_expiry_hours: i64,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            validator: ValidationService::with_default_config(),
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry_hours: config.jwt_expiry_hours,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);

        if !self.validator.validate_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if request.role == UserRole::Admin {
            return Err(AuthError::RoleNotAllowed);
        }
        self.validate_name(&request.first_name, "first_name")?;
        self.validate_name(&request.last_name, "last_name")?;
        if let Some(phone) = &request.phone {
            if !self.validator.validate_phone(phone) {
                return Err(AuthError::InvalidPhone);
            }
        }

        let password_hash = PasswordSecurityService::hash_if_acceptable(&request.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let now = Utc::now().to_rfc3339();
        let record: UserRecord = self
            .supabase
            .insert(
                USERS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "email": email,
                    "password_hash": password_hash,
                    "role": request.role,
                    "first_name": request.first_name.trim(),
                    "last_name": request.last_name.trim(),
                    "phone": request.phone,
                    "is_active": true,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!("Registered {} account {}", record.role, record.id);
        self.auth_response(record)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);

        let record = match self.find_by_email(&email).await? {
            Some(record) => record,
            None => {
                debug!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !PasswordSecurityService::verify_password(&request.password, &record.password_hash)? {
            warn!("Failed login for user {}", record.id);
            return Err(AuthError::InvalidCredentials);
        }

        if !record.is_active {
            return Err(AuthError::AccountDisabled);
        }

        info!("User {} logged in", record.id);
        self.auth_response(record)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserProfile, AuthError> {
        self.find_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or(AuthError::UserNotFound)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, AuthError> {
        let mut changes = Map::new();

        if let Some(first_name) = request.first_name {
            self.validate_name(&first_name, "first_name")?;
            changes.insert("first_name".to_string(), json!(first_name.trim()));
        }
        if let Some(last_name) = request.last_name {
            self.validate_name(&last_name, "last_name")?;
            changes.insert("last_name".to_string(), json!(last_name.trim()));
        }
        if let Some(phone) = request.phone {
            if !self.validator.validate_phone(&phone) {
                return Err(AuthError::InvalidPhone);
            }
            changes.insert("phone".to_string(), json!(phone));
        }

        if changes.is_empty() {
            return self.get_user(user_id).await;
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut rows: Vec<UserRecord> = self
            .supabase
            .update(USERS_TABLE, &format!("id=eq.{}", user_id), Value::Object(changes))
            .await?;

        if rows.is_empty() {
            return Err(AuthError::UserNotFound);
        }
        Ok(UserProfile::from(rows.swap_remove(0)))
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let record = self.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;

        if !PasswordSecurityService::verify_password(&request.current_password, &record.password_hash)? {
            return Err(AuthError::WrongCurrentPassword);
        }

        let password_hash = PasswordSecurityService::hash_if_acceptable(&request.new_password)?;

        let _: Vec<Value> = self
            .supabase
            .update(
                USERS_TABLE,
                &format!("id=eq.{}", user_id),
                json!({
                    "password_hash": password_hash,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        info!("Password changed for user {}", user_id);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let query = format!("email=eq.{}", urlencoding::encode(email));
        Ok(self.supabase.select_one(USERS_TABLE, &query).await?)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, AuthError> {
        let query = format!("id=eq.{}", user_id);
        Ok(self.supabase.select_one(USERS_TABLE, &query).await?)
    }

    fn validate_name(&self, name: &str, field: &str) -> Result<(), AuthError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.len() > 100 {
            return Err(AuthError::InvalidInput(format!(
                "{} must be between 1 and 100 characters",
                field
            )));
        }
        self.validator.ensure_clean(trimmed, field)?;
        Ok(())
    }

    fn auth_response(&self, record: UserRecord) -> Result<AuthResponse, AuthError> {
        let token = issue_token(
            &record.id.to_string(),
            &record.email,
            record.role,
            &self.jwt_secret,
            self.jwt_expiry_hours,
        )
        .map_err(AuthError::TokenIssue)?;

        Ok(AuthResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_expiry_hours * 3600,
            user: UserProfile::from(record),
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
