use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use security_cell::SecurityError;
use shared_database::DbError;
use shared_models::error::AppError;

pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: &[&str] = &["application/pdf", "image/png", "image/jpeg", "text/plain"];

// ==============================================================================
// DOCUMENTS
// ==============================================================================

/// Metadata row of an encrypted document. The ciphertext lives in storage
/// under `file_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalDocument {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub title: String,
    pub document_type: Option<String>,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing)]
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub title: String,
    /// Free-form category such as "lab_result" or "prescription".
    pub document_type: Option<String>,
    pub content_type: String,
    /// Base64 file contents, optionally as a data URL.
    pub file_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentContent {
    #[serde(flatten)]
    pub document: MedicalDocument,
    /// Decrypted contents, base64 encoded.
    pub file_data: String,
}

// ==============================================================================
// HISTORY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHistoryEntryRequest {
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MedicalRecordsError {
    #[error("Document not found")]
    NotFound,

    #[error("{0}")]
    AccessDenied(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Unsupported content type {0}, expected one of pdf, png, jpeg or plain text")]
    UnsupportedContentType(String),

    #[error("Document exceeds the {max_bytes} byte limit")]
    TooLarge { max_bytes: usize },

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Encryption(#[from] SecurityError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<MedicalRecordsError> for AppError {
    fn from(error: MedicalRecordsError) -> Self {
        match error {
            MedicalRecordsError::NotFound => AppError::NotFound(error.to_string()),
            MedicalRecordsError::AccessDenied(msg) => AppError::Forbidden(msg),
            MedicalRecordsError::InvalidDocument(_)
            | MedicalRecordsError::UnsupportedContentType(_)
            | MedicalRecordsError::ValidationError(_) => AppError::ValidationError(error.to_string()),
            MedicalRecordsError::TooLarge { .. } => AppError::PayloadTooLarge(error.to_string()),
            MedicalRecordsError::Encryption(e) => e.into(),
            MedicalRecordsError::Database(e) => e.into(),
        }
    }
}
