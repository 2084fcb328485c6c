use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::AppointmentStatus;
use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// PAYMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider_reference: Option<String>,
    /// Handed to the client to complete the payment with the provider.
    pub client_secret: Option<String>,
    pub refunded_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn refundable_amount(&self) -> f64 {
        (self.amount - self.refunded_amount).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Succeeded => write!(f, "succeeded"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundRequest {
    /// Defaults to the full remaining amount.
    pub amount: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// The slice of the appointment row a payment needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PayableAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
    pub fee: f64,
}

// ==============================================================================
// GATEWAY PAYLOADS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookPaymentData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPaymentData {
    pub payment_intent_id: String,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment not found")]
    NotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Appointment is {0}, payment is only possible once the doctor accepts")]
    AppointmentNotPayable(AppointmentStatus),

    #[error("A payment for this appointment already exists")]
    AlreadyExists,

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid refund amount: {0}")]
    InvalidAmount(String),

    #[error("Only succeeded payments can be refunded")]
    NotRefundable,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Payment gateway not configured")]
    NotConfigured,

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<PaymentError> for AppError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::NotFound | PaymentError::AppointmentNotFound => AppError::NotFound(error.to_string()),
            PaymentError::AppointmentNotPayable(_)
            | PaymentError::InvalidPayload(_)
            | PaymentError::InvalidAmount(_)
            | PaymentError::NotRefundable => AppError::BadRequest(error.to_string()),
            PaymentError::AlreadyExists => AppError::Conflict(error.to_string()),
            PaymentError::Forbidden(msg) => AppError::Forbidden(msg),
            PaymentError::InvalidSignature => AppError::Auth(error.to_string()),
            PaymentError::Gateway(msg) => AppError::ExternalService(msg),
            PaymentError::NotConfigured => AppError::Internal(error.to_string()),
            PaymentError::Database(DbError::UniqueViolation(_)) => {
                AppError::Conflict(PaymentError::AlreadyExists.to_string())
            }
            PaymentError::Database(e) => e.into(),
        }
    }
}
