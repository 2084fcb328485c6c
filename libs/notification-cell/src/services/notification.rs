use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Notification, NotificationError, NotificationListQuery, NotificationType, Recipient};
use crate::services::dispatch::{EmailDispatcher, NotificationDispatcher, SmsDispatcher};

const NOTIFICATIONS_TABLE: &str = "notifications";
const USERS_TABLE: &str = "users";
const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

pub struct NotificationService {
    supabase: SupabaseClient,
    dispatchers: Vec<Arc<dyn NotificationDispatcher>>,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        let mut dispatchers: Vec<Arc<dyn NotificationDispatcher>> = Vec::new();
        if let Some(email) = EmailDispatcher::new(config) {
            dispatchers.push(Arc::new(email));
        }
        if let Some(sms) = SmsDispatcher::new(config) {
            dispatchers.push(Arc::new(sms));
        }

        Self {
            supabase: SupabaseClient::new(config),
            dispatchers,
        }
    }

    pub fn with_dispatchers(mut self, dispatchers: Vec<Arc<dyn NotificationDispatcher>>) -> Self {
        self.dispatchers = dispatchers;
        self
    }

    /// Stores an in-app notification, then fans it out to the configured
    /// channels. Channel failures are logged and do not fail the call.
    #[instrument(skip(self, title, message))]
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Result<Notification, NotificationError> {
        let notification: Notification = self
            .supabase
            .insert(
                NOTIFICATIONS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "user_id": user_id,
                    "title": title,
                    "message": message,
                    "notification_type": kind,
                    "is_read": false,
                    "created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        debug!("Stored notification {} for user {}", notification.id, user_id);

        if !self.dispatchers.is_empty() {
            self.dispatch(user_id, title, message).await;
        }

        Ok(notification)
    }

    async fn dispatch(&self, user_id: Uuid, title: &str, message: &str) {
        let query = format!("id=eq.{}&select=email,phone,first_name", user_id);
        let recipient = match self.supabase.select_one::<Recipient>(USERS_TABLE, &query).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                warn!("No contact details for user {}, skipping dispatch", user_id);
                return;
            }
            Err(e) => {
                warn!("Failed to load contact details for user {}: {}", user_id, e);
                return;
            }
        };

        for dispatcher in &self.dispatchers {
            if let Err(e) = dispatcher.dispatch(&recipient, title, message).await {
                warn!("Notification dispatch for user {} failed: {}", user_id, e);
            }
        }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: &NotificationListQuery,
    ) -> Result<Vec<Notification>, NotificationError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        let mut filter = format!(
            "user_id=eq.{}&order=created_at.desc&limit={}&offset={}",
            user_id,
            limit,
            query.offset.unwrap_or(0)
        );
        if query.unread_only.unwrap_or(false) {
            filter.push_str("&is_read=eq.false");
        }

        Ok(self.supabase.select(NOTIFICATIONS_TABLE, &filter).await?)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, NotificationError> {
        let filter = format!("user_id=eq.{}&is_read=eq.false", user_id);
        Ok(self.supabase.count(NOTIFICATIONS_TABLE, &filter).await?)
    }

    /// Only the owner's notifications match, so other users get NotFound.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<Notification, NotificationError> {
        let filter = format!("id=eq.{}&user_id=eq.{}", notification_id, user_id);
        let mut updated: Vec<Notification> = self
            .supabase
            .update(NOTIFICATIONS_TABLE, &filter, json!({ "is_read": true }))
            .await?;

        updated.pop().ok_or(NotificationError::NotFound)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize, NotificationError> {
        let filter = format!("user_id=eq.{}&is_read=eq.false", user_id);
        let updated: Vec<Notification> = self
            .supabase
            .update(NOTIFICATIONS_TABLE, &filter, json!({ "is_read": true }))
            .await?;

        info!("Marked {} notifications read for user {}", updated.len(), user_id);
        Ok(updated.len())
    }

    pub async fn delete(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), NotificationError> {
        let filter = format!("id=eq.{}&user_id=eq.{}", notification_id, user_id);
        let existing: Option<Notification> = self.supabase.select_one(NOTIFICATIONS_TABLE, &filter).await?;
        if existing.is_none() {
            return Err(NotificationError::NotFound);
        }

        self.supabase.delete(NOTIFICATIONS_TABLE, &filter).await?;
        Ok(())
    }
}
