use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{GatewayRefund, PaymentError, PaymentIntent};

/// Card payment provider. Amounts are in minor units (cents).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        appointment_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError>;

    async fn refund(&self, provider_reference: &str, amount_minor: i64) -> Result<GatewayRefund, PaymentError>;

    async fn cancel_intent(&self, provider_reference: &str) -> Result<(), PaymentError>;
}

pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Option<Self> {
        if !config.is_payment_configured() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            base_url: config.payment_gateway_url.trim_end_matches('/').to_string(),
            secret_key: config.payment_gateway_secret_key.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, PaymentError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Payment gateway returned {}: {}", status, text);
            return Err(PaymentError::Gateway(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("Unexpected response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        appointment_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError> {
        self.post(
            "/v1/payment_intents",
            json!({
                "amount": amount_minor,
                "currency": currency,
                "metadata": { "appointment_id": appointment_id },
            }),
        )
        .await
    }

    async fn refund(&self, provider_reference: &str, amount_minor: i64) -> Result<GatewayRefund, PaymentError> {
        self.post(
            "/v1/refunds",
            json!({
                "payment_intent": provider_reference,
                "amount": amount_minor,
            }),
        )
        .await
    }

    async fn cancel_intent(&self, provider_reference: &str) -> Result<(), PaymentError> {
        let _: Value = self
            .post(&format!("/v1/payment_intents/{}/cancel", provider_reference), json!({}))
            .await?;
        Ok(())
    }
}
