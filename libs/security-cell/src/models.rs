// =====================================================================================
// SECURITY CELL MODELS
// =====================================================================================

use serde::{Deserialize, Serialize};

use shared_models::error::AppError;

// =====================================================================================
// INPUT VALIDATION MODELS
// =====================================================================================

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_string_length: usize,
    pub blocked_patterns: Vec<String>,
    pub sql_injection_patterns: Vec<String>,
    pub xss_patterns: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_string_length: 10_000,
            blocked_patterns: vec![
                r"(?i)javascript:".to_string(),
                r"(?i)vbscript:".to_string(),
                r"(?i)data:text/html".to_string(),
            ],
            sql_injection_patterns: vec![
                r"(?i)\b(union\s+select|drop\s+table|insert\s+into|delete\s+from)\b".to_string(),
                r"(?i)('|\b)\s*or\s+'?1'?\s*=\s*'?1".to_string(),
                r"--\s*$".to_string(),
            ],
            xss_patterns: vec![
                r"(?i)<\s*script".to_string(),
                r"(?i)on(error|load|click|mouseover)\s*=".to_string(),
                r"(?i)<\s*iframe".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub risk_score: u8,
    pub sanitized_input: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationIssue {
    ExceedsMaxLength { field: String, max_length: usize, actual_length: usize },
    SqlInjectionAttempt { field: String, pattern: String },
    XssAttempt { field: String, pattern: String },
    BlockedPattern { field: String, pattern: String },
}

#[derive(Debug, Deserialize)]
pub struct ValidateInputRequest {
    pub field: String,
    pub input: String,
}

// =====================================================================================
// PASSWORD MODELS
// =====================================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordStrengthResult {
    pub strength: PasswordStrength,
    pub score: u8,
    pub issues: Vec<String>,
}

impl PasswordStrengthResult {
    /// Accounts are never created with a password rated below `Fair`.
    pub fn is_acceptable(&self) -> bool {
        self.strength >= PasswordStrength::Fair && self.score > 25
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordValidationRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordValidationResponse {
    pub strength: PasswordStrength,
    pub score: u8,
    pub requirements_met: bool,
    pub suggestions: Vec<String>,
}

// =====================================================================================
// RATE LIMITING MODELS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitClass {
    General,
    Authentication,
}

// =====================================================================================
// ERROR MODELS
// =====================================================================================

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("Validation failed: {0:?}")]
    ValidationFailed(Vec<ValidationIssue>),
    #[error("Password too weak: {0:?}")]
    WeakPassword(Vec<String>),
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("Encryption failed: {0}")]
    EncryptionError(String),
    #[error("Rate limit exceeded, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
}

impl From<SecurityError> for AppError {
    fn from(error: SecurityError) -> Self {
        match error {
            SecurityError::ValidationFailed(_) | SecurityError::WeakPassword(_) => {
                AppError::ValidationError(error.to_string())
            }
            SecurityError::RateLimited { retry_after_seconds } => {
                AppError::TooManyRequests { retry_after_seconds }
            }
            SecurityError::HashingError(_)
            | SecurityError::InvalidKey(_)
            | SecurityError::EncryptionError(_) => AppError::Internal(error.to_string()),
        }
    }
}
