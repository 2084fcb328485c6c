// libs/appointment-cell/src/services/mod.rs

pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod refund;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use refund::RefundProcessor;
