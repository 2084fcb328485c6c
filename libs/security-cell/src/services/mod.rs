pub mod encryption;
pub mod password;
pub mod rate_limit;
pub mod validation;

pub use encryption::{EncryptedPayload, EncryptionService};
pub use password::PasswordSecurityService;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
pub use validation::ValidationService;
