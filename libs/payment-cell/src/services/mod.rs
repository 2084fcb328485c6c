pub mod gateway;
pub mod payment;
pub mod signature;

pub use gateway::{HttpPaymentGateway, PaymentGateway};
pub use payment::PaymentService;
pub use signature::{sign_payload, verify_signature};
