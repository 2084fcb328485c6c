// =====================================================================================
// SECURITY CELL - PASSWORDS, INPUT VALIDATION, ENCRYPTION & RATE LIMITING
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    PasswordStrength, PasswordStrengthResult, RateLimitClass, SecurityError, ValidationIssue,
    ValidationResult,
};

pub use services::{
    rate_limit_middleware, EncryptedPayload, EncryptionService, PasswordSecurityService,
    RateLimitConfig, RateLimiter, ValidationService,
};

pub use router::create_security_router;
