use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::auth::UserRole;
use shared_models::error::AppError;
use security_cell::SecurityError;

/// Row in the `users` table. Never serialized back to clients.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            role: record.role,
            first_name: record.first_name,
            last_name: record.last_name,
            phone: record.phone,
            is_active: record.is_active,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::Patient
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Invalid phone number")]
    InvalidPhone,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Administrators cannot self-register")]
    RoleNotAllowed,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Current password is incorrect")]
    WrongCurrentPassword,
    #[error("Account is deactivated")]
    AccountDisabled,
    #[error("User not found")]
    UserNotFound,
    #[error("Failed to issue token: {0}")]
    TokenIssue(String),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidEmail
            | AuthError::InvalidPhone
            | AuthError::InvalidInput(_)
            | AuthError::RoleNotAllowed => AppError::ValidationError(error.to_string()),
            AuthError::EmailTaken => AppError::Conflict(error.to_string()),
            AuthError::InvalidCredentials | AuthError::WrongCurrentPassword => {
                AppError::Auth(error.to_string())
            }
            AuthError::AccountDisabled => AppError::Forbidden(error.to_string()),
            AuthError::UserNotFound => AppError::NotFound(error.to_string()),
            AuthError::TokenIssue(msg) => AppError::Internal(msg),
            AuthError::Security(e) => e.into(),
            AuthError::Database(DbError::UniqueViolation(_)) => {
                AppError::Conflict("An account with this email already exists".to_string())
            }
            AuthError::Database(e) => e.into(),
        }
    }
}
