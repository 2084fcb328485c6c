// =====================================================================================
// SECURITY CELL HANDLERS - HTTP ENDPOINTS
// =====================================================================================

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::instrument;

use shared_models::error::AppError;

use crate::models::{
    PasswordValidationRequest, PasswordValidationResponse, ValidateInputRequest, ValidationResult,
};
use crate::services::{PasswordSecurityService, ValidationService};

pub struct SecurityHandlers {
    pub validation_service: ValidationService,
}

impl SecurityHandlers {
    pub fn new() -> Self {
        Self {
            validation_service: ValidationService::with_default_config(),
        }
    }
}

impl Default for SecurityHandlers {
    fn default() -> Self {
        Self::new()
    }
}

#[instrument(skip(request))]
pub async fn validate_password(
    Json(request): Json<PasswordValidationRequest>,
) -> Result<Json<PasswordValidationResponse>, AppError> {
    let result = PasswordSecurityService::validate_password_strength(&request.password);
    let requirements_met = result.is_acceptable();

    let mut suggestions = result.issues;
    if !requirements_met {
        suggestions.extend(PasswordSecurityService::get_password_recommendations());
    }

    Ok(Json(PasswordValidationResponse {
        strength: result.strength,
        score: result.score,
        requirements_met,
        suggestions,
    }))
}

#[instrument(skip(handlers, request))]
pub async fn validate_input(
    State(handlers): State<Arc<SecurityHandlers>>,
    Json(request): Json<ValidateInputRequest>,
) -> Result<Json<ValidationResult>, AppError> {
    if request.field.trim().is_empty() {
        return Err(AppError::BadRequest("Field name is required".to_string()));
    }

    let result = handlers
        .validation_service
        .validate_input(&request.input, &request.field);

    Ok(Json(result))
}
