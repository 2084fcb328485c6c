use async_trait::async_trait;
use uuid::Uuid;

/// Settles the payment of an appointment that leaves the payable path.
/// Implemented by the payment cell and injected into the appointment routes
/// as an extension.
#[async_trait]
pub trait RefundProcessor: Send + Sync {
    /// Returns `true` when a succeeded payment was refunded.
    async fn refund_for_appointment(&self, appointment_id: Uuid) -> anyhow::Result<bool>;

    /// Voids a payment that is still pending. Returns `true` when one was voided.
    async fn void_pending_for_appointment(&self, appointment_id: Uuid) -> anyhow::Result<bool>;
}
