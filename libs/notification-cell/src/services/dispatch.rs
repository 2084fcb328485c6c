use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::{NotificationError, Recipient};

/// Out-of-band delivery channel for notifications.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn dispatch(
        &self,
        recipient: &Recipient,
        title: &str,
        message: &str,
    ) -> Result<(), NotificationError>;
}

/// Transactional email provider reached over HTTP.
pub struct EmailDispatcher {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailDispatcher {
    pub fn new(config: &AppConfig) -> Option<Self> {
        if !config.is_email_configured() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for EmailDispatcher {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn dispatch(
        &self,
        recipient: &Recipient,
        title: &str,
        message: &str,
    ) -> Result<(), NotificationError> {
        let body = json!({
            "from": self.from,
            "to": recipient.email,
            "subject": title,
            "text": format!("Hello {},\n\n{}", recipient.first_name, message),
        });

        post(&self.client, &self.api_url, &self.api_key, body, self.channel()).await
    }
}

pub struct SmsDispatcher {
    client: Client,
    api_url: String,
    api_key: String,
}

impl SmsDispatcher {
    pub fn new(config: &AppConfig) -> Option<Self> {
        if !config.is_sms_configured() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            api_url: config.sms_api_url.clone(),
            api_key: config.sms_api_key.clone(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for SmsDispatcher {
    fn channel(&self) -> &'static str {
        "sms"
    }

    async fn dispatch(
        &self,
        recipient: &Recipient,
        title: &str,
        message: &str,
    ) -> Result<(), NotificationError> {
        let Some(phone) = recipient.phone.as_deref() else {
            debug!("Recipient has no phone number, skipping SMS");
            return Ok(());
        };

        let body = json!({
            "to": phone,
            "body": format!("{}: {}", title, message),
        });

        post(&self.client, &self.api_url, &self.api_key, body, self.channel()).await
    }
}

async fn post(
    client: &Client,
    url: &str,
    api_key: &str,
    body: serde_json::Value,
    channel: &'static str,
) -> Result<(), NotificationError> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| NotificationError::Dispatch { channel, message: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(NotificationError::Dispatch {
            channel,
            message: format!("HTTP {}: {}", status, text),
        });
    }

    debug!("Dispatched {} notification", channel);
    Ok(())
}
