use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_database::DbError;
use shared_models::auth::UserRole;
use shared_models::error::AppError;

// ==============================================================================
// USERS
// ==============================================================================

/// User row without credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyDoctorRequest {
    #[serde(default = "default_verified")]
    pub verified: bool,
}

fn default_verified() -> bool {
    true
}

impl Default for VerifyDoctorRequest {
    fn default() -> Self {
        Self { verified: true }
    }
}

// ==============================================================================
// STATS
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlatformStats {
    pub users_by_role: BTreeMap<String, i64>,
    pub appointments_by_status: BTreeMap<String, i64>,
    /// Succeeded payments net of refunds.
    pub revenue: f64,
    pub refunded: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PaymentAmounts {
    pub amount: f64,
    pub refunded_amount: f64,
}

// ==============================================================================
// BACKUPS
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackupInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub backup: BackupInfo,
    pub pruned: usize,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Backups are not configured: set DATABASE_URL and BACKUP_DIR")]
    BackupNotConfigured,

    #[error("Backup failed: {0}")]
    BackupFailed(String),

    #[error("Backup storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<DoctorError> for AdminError {
    fn from(error: DoctorError) -> Self {
        match error {
            DoctorError::NotFound => AdminError::NotFound("Doctor".to_string()),
            DoctorError::Database(e) => AdminError::Database(e),
            other => AdminError::ValidationError(other.to_string()),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::NotFound(_) => AppError::NotFound(error.to_string()),
            AdminError::ValidationError(_) => AppError::ValidationError(error.to_string()),
            AdminError::BackupNotConfigured | AdminError::BackupFailed(_) | AdminError::Io(_) => {
                AppError::Internal(error.to_string())
            }
            AdminError::Database(e) => e.into(),
        }
    }
}
