// libs/appointment-cell/src/lib.rs
//! Appointment booking and lifecycle.
//!
//! `awaiting_acceptance -> payment_pending -> confirmed -> completed`, with
//! cancellation from any open state and rejection before acceptance.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::appointment_routes;
pub use services::{AppointmentBookingService, AppointmentLifecycleService, RefundProcessor};
