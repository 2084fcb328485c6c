//! Payments for accepted appointments: intents with the card gateway,
//! signed provider webhooks that confirm the appointment, and refunds.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::payment_routes;
pub use services::*;
