use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::{AppointmentBookingService, AppointmentStatus, RefundProcessor};
use notification_cell::{NotificationService, NotificationType};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{User, UserRole};

use crate::models::{
    PayableAppointment, Payment, PaymentError, PaymentListQuery, PaymentStatus, RefundRequest, WebhookEvent,
    WebhookOutcome,
};
use crate::services::gateway::{to_minor_units, HttpPaymentGateway, PaymentGateway};
use crate::services::signature::verify_signature;

const PAYMENTS_TABLE: &str = "payments";
const APPOINTMENTS_TABLE: &str = "appointments";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

const EVENT_SUCCEEDED: &str = "payment.succeeded";
const EVENT_FAILED: &str = "payment.failed";

pub struct PaymentService {
    supabase: SupabaseClient,
    gateway: Option<Arc<dyn PaymentGateway>>,
    appointments: AppointmentBookingService,
    notifications: NotificationService,
    currency: String,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        let gateway = HttpPaymentGateway::new(config).map(|g| Arc::new(g) as Arc<dyn PaymentGateway>);

        Self {
            supabase: SupabaseClient::new(config),
            gateway,
            appointments: AppointmentBookingService::new(config),
            notifications: NotificationService::new(config),
            currency: config.payment_currency.clone(),
            webhook_secret: config.payment_webhook_secret.clone(),
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>, PaymentError> {
        self.gateway.as_ref().ok_or(PaymentError::NotConfigured)
    }

    // ==========================================================================
    // CHECKOUT
    // ==========================================================================

    /// Opens a payment intent for an accepted appointment. A previously
    /// failed attempt is reused with a fresh intent.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_payment(&self, user: &User, appointment_id: Uuid) -> Result<Payment, PaymentError> {
        let appointment: PayableAppointment = self
            .supabase
            .select_one(
                APPOINTMENTS_TABLE,
                &format!("select=id,patient_id,status,fee&id=eq.{}", appointment_id),
            )
            .await?
            .ok_or(PaymentError::AppointmentNotFound)?;

        if !user.is(&appointment.patient_id) {
            return Err(PaymentError::Forbidden(
                "Only the appointment's patient can pay for it".to_string(),
            ));
        }
        if appointment.status != AppointmentStatus::PaymentPending {
            return Err(PaymentError::AppointmentNotPayable(appointment.status));
        }

        let existing: Option<Payment> = self
            .supabase
            .select_one(PAYMENTS_TABLE, &format!("appointment_id=eq.{}", appointment_id))
            .await?;
        if let Some(payment) = &existing {
            if payment.status != PaymentStatus::Failed {
                return Err(PaymentError::AlreadyExists);
            }
        }

        let intent = self
            .gateway()?
            .create_intent(to_minor_units(appointment.fee), &self.currency, appointment.id)
            .await?;
        debug!("Created payment intent {} for appointment {}", intent.id, appointment.id);

        let payment = match existing {
            Some(failed) => {
                let mut rows: Vec<Payment> = self
                    .supabase
                    .update(
                        PAYMENTS_TABLE,
                        &format!("id=eq.{}&status=eq.failed", failed.id),
                        json!({
                            "status": PaymentStatus::Pending,
                            "amount": appointment.fee,
                            "currency": self.currency,
                            "provider_reference": intent.id,
                            "client_secret": intent.client_secret,
                            "updated_at": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await?;
                rows.pop().ok_or(PaymentError::AlreadyExists)?
            }
            None => {
                self.supabase
                    .insert(
                        PAYMENTS_TABLE,
                        json!({
                            "id": Uuid::new_v4(),
                            "appointment_id": appointment.id,
                            "patient_id": appointment.patient_id,
                            "amount": appointment.fee,
                            "currency": self.currency,
                            "status": PaymentStatus::Pending,
                            "provider_reference": intent.id,
                            "client_secret": intent.client_secret,
                            "refunded_amount": 0.0,
                        }),
                    )
                    .await?
            }
        };

        info!("Payment {} opened for appointment {}", payment.id, appointment.id);
        Ok(payment)
    }

    // ==========================================================================
    // WEBHOOKS
    // ==========================================================================

    /// Verifies and applies a provider event. Replayed events are harmless.
    #[instrument(skip(self, payload, signature))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let signature = signature.ok_or(PaymentError::InvalidSignature)?;
        verify_signature(&self.webhook_secret, payload, signature)?;

        let event: WebhookEvent =
            serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        debug!("Webhook event {} ({})", event.id, event.event_type);

        if event.event_type != EVENT_SUCCEEDED && event.event_type != EVENT_FAILED {
            debug!("Ignoring webhook event type {}", event.event_type);
            return Ok(WebhookOutcome::Ignored);
        }

        let payment: Option<Payment> = self
            .supabase
            .select_one(
                PAYMENTS_TABLE,
                &format!("provider_reference=eq.{}", event.data.payment_intent_id),
            )
            .await?;
        let Some(payment) = payment else {
            warn!("Webhook for unknown payment intent {}", event.data.payment_intent_id);
            return Ok(WebhookOutcome::Ignored);
        };

        if event.event_type == EVENT_SUCCEEDED {
            self.apply_success(payment).await
        } else {
            self.apply_failure(payment, event.data.failure_reason).await
        }
    }

    async fn apply_success(&self, payment: Payment) -> Result<WebhookOutcome, PaymentError> {
        let (payment, outcome) = match payment.status {
            PaymentStatus::Succeeded => (payment, WebhookOutcome::Duplicate),
            PaymentStatus::Refunded => {
                warn!("Success event for refunded payment {}", payment.id);
                return Ok(WebhookOutcome::Ignored);
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {
                let mut rows: Vec<Payment> = self
                    .supabase
                    .update(
                        PAYMENTS_TABLE,
                        &format!("id=eq.{}&status=in.(pending,failed)", payment.id),
                        json!({
                            "status": PaymentStatus::Succeeded,
                            "updated_at": Utc::now().to_rfc3339(),
                        }),
                    )
                    .await?;
                match rows.pop() {
                    Some(updated) => {
                        info!("Payment {} succeeded", updated.id);
                        self.notify(
                            updated.patient_id,
                            NotificationType::PaymentSucceeded,
                            "Payment received",
                            &format!("We received your payment of {:.2} {}.", updated.amount, updated.currency),
                        )
                        .await;
                        (updated, WebhookOutcome::Processed)
                    }
                    None => (self.fetch(payment.id).await?, WebhookOutcome::Duplicate),
                }
            }
        };

        if payment.status == PaymentStatus::Succeeded {
            self.settle_paid_appointment(payment).await?;
        }
        Ok(outcome)
    }

    /// Confirms the appointment a payment was made for, or refunds the payment
    /// when the appointment has left the payable path in the meantime. Both
    /// are idempotent, so a replay can finish a half-applied event.
    async fn settle_paid_appointment(&self, payment: Payment) -> Result<(), PaymentError> {
        let appointment: Option<PayableAppointment> = self
            .supabase
            .select_one(
                APPOINTMENTS_TABLE,
                &format!("select=id,patient_id,status,fee&id=eq.{}", payment.appointment_id),
            )
            .await?;
        let Some(appointment) = appointment else {
            warn!("Payment {} belongs to missing appointment {}", payment.id, payment.appointment_id);
            return Ok(());
        };

        match appointment.status {
            AppointmentStatus::PaymentPending | AppointmentStatus::Confirmed => {
                if let Err(e) = self.appointments.confirm_paid_appointment(appointment.id).await {
                    warn!("Failed to confirm appointment {} after payment: {}", appointment.id, e);
                }
            }
            AppointmentStatus::Cancelled | AppointmentStatus::Rejected | AppointmentStatus::AwaitingAcceptance => {
                warn!(
                    "Payment {} succeeded for {} appointment {}, refunding",
                    payment.id, appointment.status, appointment.id
                );
                self.refund(payment, None, Some(format!("Appointment is {}", appointment.status)))
                    .await?;
            }
            AppointmentStatus::Completed => {
                debug!("Appointment {} already completed", appointment.id);
            }
        }
        Ok(())
    }

    async fn apply_failure(
        &self,
        payment: Payment,
        failure_reason: Option<String>,
    ) -> Result<WebhookOutcome, PaymentError> {
        if payment.status != PaymentStatus::Pending {
            return Ok(WebhookOutcome::Duplicate);
        }

        let rows: Vec<Payment> = self
            .supabase
            .update(
                PAYMENTS_TABLE,
                &format!("id=eq.{}&status=eq.pending", payment.id),
                json!({
                    "status": PaymentStatus::Failed,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        if rows.is_empty() {
            return Ok(WebhookOutcome::Duplicate);
        }

        let reason = failure_reason.unwrap_or_else(|| "the card was declined".to_string());
        warn!("Payment {} failed: {}", payment.id, reason);
        self.notify(
            payment.patient_id,
            NotificationType::PaymentFailed,
            "Payment failed",
            &format!("Your payment could not be processed ({}). Please try again.", reason),
        )
        .await;

        Ok(WebhookOutcome::Processed)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get_payment(&self, user: &User, payment_id: Uuid) -> Result<Payment, PaymentError> {
        let payment = self.fetch(payment_id).await?;
        if !user.is_admin() && !user.is(&payment.patient_id) {
            return Err(PaymentError::Forbidden("Not allowed to view this payment".to_string()));
        }
        Ok(payment)
    }

    pub async fn list_payments(&self, user: &User, query: &PaymentListQuery) -> Result<Vec<Payment>, PaymentError> {
        let mut filters = match user.role() {
            Some(UserRole::Patient) => vec![format!("patient_id=eq.{}", user.id)],
            Some(UserRole::Admin) => Vec::new(),
            _ => {
                return Err(PaymentError::Forbidden(
                    "Only patients and admins can list payments".to_string(),
                ))
            }
        };

        if let Some(status) = query.status {
            filters.push(format!("status=eq.{}", status));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        filters.push("order=created_at.desc".to_string());
        filters.push(format!("limit={}", limit));
        filters.push(format!("offset={}", query.offset.unwrap_or(0)));

        Ok(self.supabase.select(PAYMENTS_TABLE, &filters.join("&")).await?)
    }

    // ==========================================================================
    // REFUNDS
    // ==========================================================================

    /// Refunds all or part of a succeeded payment. The payment becomes
    /// `refunded` once nothing is left to refund.
    #[instrument(skip(self, request))]
    pub async fn refund_payment(&self, payment_id: Uuid, request: RefundRequest) -> Result<Payment, PaymentError> {
        let payment = self.fetch(payment_id).await?;
        self.refund(payment, request.amount, request.reason).await
    }

    /// Refunds whatever remains of the appointment's succeeded payment.
    pub async fn refund_for_appointment(&self, appointment_id: Uuid) -> Result<bool, PaymentError> {
        let payment: Option<Payment> = self
            .supabase
            .select_one(
                PAYMENTS_TABLE,
                &format!("appointment_id=eq.{}&status=eq.succeeded", appointment_id),
            )
            .await?;

        match payment {
            Some(payment) => {
                self.refund(payment, None, Some("Appointment cancelled".to_string())).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Cancels the appointment's open intent and marks the payment failed, so
    /// a success arriving afterwards is refunded rather than confirming.
    pub async fn void_pending_for_appointment(&self, appointment_id: Uuid) -> Result<bool, PaymentError> {
        let payment: Option<Payment> = self
            .supabase
            .select_one(
                PAYMENTS_TABLE,
                &format!("appointment_id=eq.{}&status=eq.pending", appointment_id),
            )
            .await?;
        let Some(payment) = payment else {
            return Ok(false);
        };

        if let (Some(gateway), Some(reference)) = (&self.gateway, payment.provider_reference.as_deref()) {
            if let Err(e) = gateway.cancel_intent(reference).await {
                warn!("Failed to cancel payment intent {}: {}", reference, e);
            }
        }

        let rows: Vec<Payment> = self
            .supabase
            .update(
                PAYMENTS_TABLE,
                &format!("id=eq.{}&status=eq.pending", payment.id),
                json!({
                    "status": PaymentStatus::Failed,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        if rows.is_empty() {
            return Ok(false);
        }

        info!("Voided pending payment {} for appointment {}", payment.id, appointment_id);
        Ok(true)
    }

    async fn refund(
        &self,
        payment: Payment,
        amount: Option<f64>,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        if payment.status != PaymentStatus::Succeeded {
            return Err(PaymentError::NotRefundable);
        }

        let remaining = payment.refundable_amount();
        let amount = amount.unwrap_or(remaining);
        if amount <= 0.0 {
            return Err(PaymentError::InvalidAmount("must be greater than zero".to_string()));
        }
        if to_minor_units(amount) > to_minor_units(remaining) {
            return Err(PaymentError::InvalidAmount(format!("at most {:.2} can be refunded", remaining)));
        }

        let provider_reference = payment
            .provider_reference
            .as_deref()
            .ok_or(PaymentError::NotRefundable)?;
        let refund = self
            .gateway()?
            .refund(provider_reference, to_minor_units(amount))
            .await?;

        let refunded_amount = payment.refunded_amount + amount;
        let fully_refunded = to_minor_units(refunded_amount) >= to_minor_units(payment.amount);
        let status = if fully_refunded {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Succeeded
        };

        let mut rows: Vec<Payment> = self
            .supabase
            .update(
                PAYMENTS_TABLE,
                &format!("id=eq.{}&status=eq.succeeded", payment.id),
                json!({
                    "status": status,
                    "refunded_amount": refunded_amount,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        let updated = rows.pop().ok_or(PaymentError::NotRefundable)?;

        info!(
            "Refund {} of {:.2} issued for payment {} ({})",
            refund.id,
            amount,
            payment.id,
            reason.as_deref().unwrap_or("no reason given")
        );
        self.notify(
            payment.patient_id,
            NotificationType::PaymentRefunded,
            "Payment refunded",
            &format!("{:.2} {} has been refunded to you.", amount, payment.currency),
        )
        .await;

        Ok(updated)
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn fetch(&self, payment_id: Uuid) -> Result<Payment, PaymentError> {
        self.supabase
            .select_one(PAYMENTS_TABLE, &format!("id=eq.{}", payment_id))
            .await?
            .ok_or(PaymentError::NotFound)
    }

    async fn notify(&self, user_id: Uuid, kind: NotificationType, title: &str, message: &str) {
        if let Err(e) = self.notifications.notify(user_id, kind, title, message).await {
            warn!("Failed to notify user {}: {}", user_id, e);
        }
    }
}

#[async_trait]
impl RefundProcessor for PaymentService {
    async fn refund_for_appointment(&self, appointment_id: Uuid) -> anyhow::Result<bool> {
        Ok(PaymentService::refund_for_appointment(self, appointment_id).await?)
    }

    async fn void_pending_for_appointment(&self, appointment_id: Uuid) -> anyhow::Result<bool> {
        Ok(PaymentService::void_pending_for_appointment(self, appointment_id).await?)
    }
}
