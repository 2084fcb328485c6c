use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,

    // Postgres via PostgREST
    pub supabase_url: String,
    pub supabase_service_key: String,

    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,

    /// Base64-encoded 32 byte key for medical document encryption.
    pub encryption_key: String,

    pub payment_gateway_url: String,
    pub payment_gateway_secret_key: String,
    pub payment_webhook_secret: String,
    pub payment_currency: String,

    pub zoom_api_base_url: String,
    pub zoom_oauth_url: String,
    pub zoom_account_id: String,
    pub zoom_client_id: String,
    pub zoom_client_secret: String,

    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub sms_api_url: String,
    pub sms_api_key: String,

    pub maps_api_url: String,
    pub maps_api_key: String,

    pub database_url: String,
    pub backup_dir: String,
    pub backup_retention_days: i64,

    pub rate_limit_per_minute: u32,
    pub auth_rate_limit_per_minute: u32,
    pub max_body_bytes: usize,
}

fn string_var(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn string_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn parsed_var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value ({}), using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            port: parsed_var_or("PORT", 3000),
            supabase_url: string_var("SUPABASE_URL"),
            supabase_service_key: string_var("SUPABASE_SERVICE_KEY"),
            jwt_secret: string_var("JWT_SECRET"),
            jwt_expiry_hours: parsed_var_or("JWT_EXPIRY_HOURS", 24),
            redis_url: env::var("REDIS_URL").ok(),
            cache_ttl_seconds: parsed_var_or("CACHE_TTL_SECONDS", 300),
            encryption_key: string_var("ENCRYPTION_KEY"),
            payment_gateway_url: string_var("PAYMENT_GATEWAY_URL"),
            payment_gateway_secret_key: string_var("PAYMENT_GATEWAY_SECRET_KEY"),
            payment_webhook_secret: string_var("PAYMENT_WEBHOOK_SECRET"),
            payment_currency: string_var_or("PAYMENT_CURRENCY", "usd"),
            zoom_api_base_url: string_var_or("ZOOM_API_BASE_URL", "https://api.zoom.us/v2"),
            zoom_oauth_url: string_var_or("ZOOM_OAUTH_URL", "https://zoom.us/oauth/token"),
            zoom_account_id: string_var("ZOOM_ACCOUNT_ID"),
            zoom_client_id: string_var("ZOOM_CLIENT_ID"),
            zoom_client_secret: string_var("ZOOM_CLIENT_SECRET"),
            email_api_url: string_var("EMAIL_API_URL"),
            email_api_key: string_var("EMAIL_API_KEY"),
            email_from: string_var_or("EMAIL_FROM", "no-reply@medibook.local"),
            sms_api_url: string_var("SMS_API_URL"),
            sms_api_key: string_var("SMS_API_KEY"),
            maps_api_url: string_var_or(
                "MAPS_API_URL",
                "https://maps.googleapis.com/maps/api/geocode/json",
            ),
            maps_api_key: string_var("MAPS_API_KEY"),
            database_url: string_var("DATABASE_URL"),
            backup_dir: string_var_or("BACKUP_DIR", "./backups"),
            backup_retention_days: parsed_var_or("BACKUP_RETENTION_DAYS", 14),
            rate_limit_per_minute: parsed_var_or("RATE_LIMIT_PER_MINUTE", 120),
            auth_rate_limit_per_minute: parsed_var_or("AUTH_RATE_LIMIT_PER_MINUTE", 10),
            max_body_bytes: parsed_var_or("MAX_BODY_BYTES", 15 * 1024 * 1024),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_gateway_url.is_empty()
            && !self.payment_gateway_secret_key.is_empty()
            && !self.payment_webhook_secret.is_empty()
    }

    pub fn is_video_conferencing_configured(&self) -> bool {
        !self.zoom_account_id.is_empty()
            && !self.zoom_client_id.is_empty()
            && !self.zoom_client_secret.is_empty()
            && !self.zoom_api_base_url.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.sms_api_url.is_empty() && !self.sms_api_key.is_empty()
    }

    pub fn is_maps_configured(&self) -> bool {
        !self.maps_api_url.is_empty() && !self.maps_api_key.is_empty()
    }

    pub fn is_backup_configured(&self) -> bool {
        !self.database_url.is_empty() && !self.backup_dir.is_empty()
    }
}
