use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    AppointmentBooked,
    AppointmentAccepted,
    AppointmentRejected,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
    AppointmentCompleted,
    PaymentSucceeded,
    PaymentFailed,
    PaymentRefunded,
    ReviewReceived,
    AccountUpdate,
    #[serde(other)]
    System,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Contact details used by the email and SMS dispatchers.
#[derive(Debug, Clone, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Dispatch via {channel} failed: {message}")]
    Dispatch { channel: &'static str, message: String },

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<NotificationError> for AppError {
    fn from(error: NotificationError) -> Self {
        match error {
            NotificationError::NotFound => AppError::NotFound(error.to_string()),
            NotificationError::Dispatch { .. } => AppError::ExternalService(error.to_string()),
            NotificationError::Database(e) => e.into(),
        }
    }
}
