use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::error::AppError;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation(_))
    }
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::UniqueViolation(msg) => AppError::Conflict(msg),
            DbError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}

/// Thin PostgREST/Storage client authenticated with the service key.
/// Authorization is enforced by the handlers, not by row level security.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, DbError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| DbError::Config(format!("invalid service key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| DbError::Config(format!("invalid service key: {}", e)))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::map_error(status, &text));
        }

        // 204 and "return=minimal" responses carry no body
        let raw = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(raw).map_err(|e| DbError::Decode(e.to_string()))
    }

    fn map_error(status: StatusCode, body: &str) -> DbError {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(str::to_string));

        if status == StatusCode::CONFLICT || code.as_deref() == Some(UNIQUE_VIOLATION) {
            debug!("Unique constraint violation: {}", body);
            return DbError::UniqueViolation(body.to_string());
        }

        error!("API error ({}): {}", status, body);

        match status.as_u16() {
            401 | 403 => DbError::Unauthorized(body.to_string()),
            404 => DbError::NotFound(body.to_string()),
            other => DbError::Api {
                status: other,
                message: body.to_string(),
            },
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn table_path(table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        }
    }

    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, &Self::table_path(table, query), None).await
    }

    pub async fn select_one<T>(&self, table: &str, query: &str) -> Result<Option<T>, DbError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self.select(table, query).await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.swap_remove(0)))
        }
    }

    pub async fn insert<T>(&self, table: &str, row: Value) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self
            .request_with_headers(
                Method::POST,
                &Self::table_path(table, ""),
                Some(row),
                Some(Self::representation_headers()),
            )
            .await?;

        if rows.is_empty() {
            return Err(DbError::Decode(format!("insert into {} returned no rows", table)));
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn update<T>(&self, table: &str, filter: &str, changes: Value) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(
            Method::PATCH,
            &Self::table_path(table, filter),
            Some(changes),
            Some(Self::representation_headers()),
        )
        .await
    }

    pub async fn delete(&self, table: &str, filter: &str) -> Result<(), DbError> {
        let _: Value = self
            .request(Method::DELETE, &Self::table_path(table, filter), None)
            .await?;
        Ok(())
    }

    /// Exact row count using PostgREST's `Content-Range` header.
    pub async fn count(&self, table: &str, filter: &str) -> Result<i64, DbError> {
        let query = if filter.is_empty() {
            "select=id&limit=1".to_string()
        } else {
            format!("{}&select=id&limit=1", filter)
        };
        let url = format!("{}{}", self.base_url, Self::table_path(table, &query));

        let mut headers = self.get_headers()?;
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.client.get(&url).headers(headers).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return Err(Self::map_error(status, &text));
        }

        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self::parse_content_range_total(&range)
            .ok_or_else(|| DbError::Decode(format!("unexpected Content-Range: {:?}", range)))
    }

    fn parse_content_range_total(range: &str) -> Option<i64> {
        range.rsplit('/').next().and_then(|total| total.trim().parse().ok())
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DbError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers()?;
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| DbError::Config(format!("invalid content type: {}", e)))?;
        headers.insert(CONTENT_TYPE, content_type);

        let response = self.client.post(&url).headers(headers).body(bytes).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(Self::map_error(status, &text));
        }
        Ok(())
    }

    pub async fn download_object(&self, bucket: &str, object_path: &str) -> Result<Vec<u8>, DbError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        let response = self.client.get(&url).headers(self.get_headers()?).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(Self::map_error(status, &text));
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn delete_object(&self, bucket: &str, object_path: &str) -> Result<(), DbError> {
        let path = format!("/storage/v1/object/{}/{}", bucket, object_path);
        let _: Value = self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        let _: Value = self.request(Method::GET, "/rest/v1/", None).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SupabaseClient {
        let mut config = AppConfig::from_env();
        config.supabase_url = server.uri();
        config.supabase_service_key = "service-key".to_string();
        SupabaseClient::new(&config)
    }

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(SupabaseClient::parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(SupabaseClient::parse_content_range_total("*/0"), Some(0));
        assert_eq!(SupabaseClient::parse_content_range_total(""), None);
    }

    #[tokio::test]
    async fn unique_violation_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            })))
            .mount(&server)
            .await;

        let result: Result<Value, DbError> = client_for(&server)
            .insert("appointments", json!({ "id": "x" }))
            .await;

        assert_matches!(result, Err(DbError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn sends_service_key_and_decodes_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.a@b.com"))
            .and(header("apikey", "service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "1" }])))
            .mount(&server)
            .await;

        let row: Option<Value> = client_for(&server)
            .select_one("users", "email=eq.a@b.com")
            .await
            .unwrap();

        assert_eq!(row.unwrap()["id"], "1");
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/notifications"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = client_for(&server).delete("notifications", "id=eq.1").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn count_reads_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-range", "0-0/17")
                    .set_body_json(json!([{ "id": "1" }])),
            )
            .mount(&server)
            .await;

        let total = client_for(&server).count("users", "role=eq.patient").await.unwrap();
        assert_eq!(total, 17);
    }
}
