// libs/video-conferencing-cell/src/services/zoom.rs
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{
    CreateMeetingParams, VideoConferencingError, ZoomCreateMeetingRequest, ZoomCreatedMeeting,
    ZoomMeetingSettings, ZoomTokenResponse,
};

/// Refresh tokens this long before Zoom says they expire.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[async_trait]
pub trait ZoomApi: Send + Sync {
    async fn create_meeting(
        &self,
        params: CreateMeetingParams,
    ) -> Result<ZoomCreatedMeeting, VideoConferencingError>;

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), VideoConferencingError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

type TokenCache = RwLock<HashMap<String, CachedToken>>;

/// Process-wide token cache keyed by OAuth endpoint and account, so that
/// per-request clients share one server-to-server token.
fn token_cache() -> &'static TokenCache {
    static CACHE: OnceLock<TokenCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Zoom REST client using server-to-server OAuth.
#[cfg_attr(test, derive(Debug))]
pub struct ZoomClient {
    client: Client,
    api_base_url: String,
    oauth_url: String,
    account_id: String,
    client_id: String,
    client_secret: String,
}

impl ZoomClient {
    pub fn new(config: &AppConfig) -> Result<Self, VideoConferencingError> {
        if !config.is_video_conferencing_configured() {
            return Err(VideoConferencingError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_base_url: config.zoom_api_base_url.trim_end_matches('/').to_string(),
            oauth_url: config.zoom_oauth_url.clone(),
            account_id: config.zoom_account_id.clone(),
            client_id: config.zoom_client_id.clone(),
            client_secret: config.zoom_client_secret.clone(),
        })
    }

    pub fn shared(config: &AppConfig) -> Option<Arc<dyn ZoomApi>> {
        Self::new(config).ok().map(|c| Arc::new(c) as Arc<dyn ZoomApi>)
    }

    fn cache_key(&self) -> String {
        format!("{}#{}", self.oauth_url, self.account_id)
    }

    async fn access_token(&self) -> Result<String, VideoConferencingError> {
        let key = self.cache_key();
        let now = Utc::now();

        if let Some(cached) = token_cache().read().await.get(&key) {
            if cached.expires_at > now {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = token_cache().write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(cached) = cache.get(&key) {
            if cached.expires_at > now {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("Requesting new Zoom access token");
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .client
            .post(&self.oauth_url)
            .header("Authorization", format!("Basic {}", credentials))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.account_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| VideoConferencingError::ZoomApiError { message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Zoom OAuth failed: {} - {}", status, body);
            return Err(VideoConferencingError::ZoomApiError {
                message: format!("OAuth HTTP {}", status),
            });
        }

        let token: ZoomTokenResponse = response
            .json()
            .await
            .map_err(|e| VideoConferencingError::ZoomApiError { message: e.to_string() })?;

        let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        cache.insert(
            key,
            CachedToken {
                access_token: token.access_token.clone(),
                expires_at: now + Duration::seconds(lifetime),
            },
        );

        Ok(token.access_token)
    }
}

#[async_trait]
impl ZoomApi for ZoomClient {
    async fn create_meeting(
        &self,
        params: CreateMeetingParams,
    ) -> Result<ZoomCreatedMeeting, VideoConferencingError> {
        let token = self.access_token().await?;
        let url = format!("{}/users/me/meetings", self.api_base_url);

        let body = ZoomCreateMeetingRequest {
            topic: params.topic,
            meeting_type: 2,
            start_time: params.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            duration: params.duration_minutes,
            timezone: "UTC".to_string(),
            settings: ZoomMeetingSettings {
                join_before_host: false,
                waiting_room: true,
                host_video: true,
                participant_video: true,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| VideoConferencingError::ZoomApiError { message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Zoom meeting creation failed: {} - {}", status, text);
            return Err(VideoConferencingError::ZoomApiError {
                message: format!("HTTP {}: {}", status, text),
            });
        }

        let meeting: ZoomCreatedMeeting = response
            .json()
            .await
            .map_err(|e| VideoConferencingError::ZoomApiError { message: e.to_string() })?;

        info!("Created Zoom meeting {}", meeting.id);
        Ok(meeting)
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), VideoConferencingError> {
        let token = self.access_token().await?;
        let url = format!("{}/meetings/{}", self.api_base_url, meeting_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| VideoConferencingError::ZoomApiError { message: e.to_string() })?;

        match response.status() {
            status if status.is_success() => {
                info!("Deleted Zoom meeting {}", meeting_id);
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                warn!("Zoom meeting {} was already gone", meeting_id);
                Ok(())
            }
            status => Err(VideoConferencingError::ZoomApiError {
                message: format!("HTTP {} deleting meeting {}", status, meeting_id),
            }),
        }
    }
}
