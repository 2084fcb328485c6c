// =====================================================================================
// VALIDATION SERVICE - INPUT VALIDATION & SANITIZATION
// =====================================================================================

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::models::{SecurityError, ValidationConfig, ValidationIssue, ValidationResult};

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static email pattern")
    })
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("static phone pattern"))
}

pub struct ValidationService {
    config: ValidationConfig,
    sql_patterns: Vec<Regex>,
    xss_patterns: Vec<Regex>,
    blocked_patterns: Vec<Regex>,
}

impl ValidationService {
    pub fn new(config: ValidationConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
        };

        Self {
            sql_patterns: compile(&config.sql_injection_patterns),
            xss_patterns: compile(&config.xss_patterns),
            blocked_patterns: compile(&config.blocked_patterns),
            config,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(ValidationConfig::default())
    }

    #[instrument(skip(self, input))]
    pub fn validate_input(&self, input: &str, field_name: &str) -> ValidationResult {
        let mut issues = Vec::new();
        let mut risk_score = 0u8;

        if input.len() > self.config.max_string_length {
            issues.push(ValidationIssue::ExceedsMaxLength {
                field: field_name.to_string(),
                max_length: self.config.max_string_length,
                actual_length: input.len(),
            });
            risk_score = risk_score.saturating_add(10);
        }

        for pattern in &self.sql_patterns {
            if pattern.is_match(input) {
                issues.push(ValidationIssue::SqlInjectionAttempt {
                    field: field_name.to_string(),
                    pattern: pattern.as_str().to_string(),
                });
                risk_score = risk_score.saturating_add(50);
            }
        }

        for pattern in &self.xss_patterns {
            if pattern.is_match(input) {
                issues.push(ValidationIssue::XssAttempt {
                    field: field_name.to_string(),
                    pattern: pattern.as_str().to_string(),
                });
                risk_score = risk_score.saturating_add(40);
            }
        }

        for pattern in &self.blocked_patterns {
            if pattern.is_match(input) {
                issues.push(ValidationIssue::BlockedPattern {
                    field: field_name.to_string(),
                    pattern: pattern.as_str().to_string(),
                });
                risk_score = risk_score.saturating_add(30);
            }
        }

        if !issues.is_empty() {
            debug!("Input for {} flagged with {} issues", field_name, issues.len());
        }

        ValidationResult {
            is_valid: issues.is_empty(),
            issues,
            risk_score,
            sanitized_input: self.sanitize_input(input),
        }
    }

    /// Reject free-text fields that trip any pattern.
    pub fn ensure_clean(&self, input: &str, field_name: &str) -> Result<(), SecurityError> {
        let result = self.validate_input(input, field_name);
        if result.is_valid {
            Ok(())
        } else {
            Err(SecurityError::ValidationFailed(result.issues))
        }
    }

    pub fn sanitize_input(&self, input: &str) -> String {
        input
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#x27;")
    }

    pub fn validate_email(&self, email: &str) -> bool {
        email.len() <= 254 && email_regex().is_match(email)
    }

    pub fn validate_phone(&self, phone: &str) -> bool {
        let digits: String = phone.chars().filter(|c| !matches!(c, ' ' | '-' | '(' | ')')).collect();
        phone_regex().is_match(&digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_clinical_text() {
        let service = ValidationService::with_default_config();
        let result = service.validate_input("Persistent cough for two weeks, worse at night.", "reason");
        assert!(result.is_valid);
        assert_eq!(result.risk_score, 0);
    }

    #[test]
    fn flags_script_injection() {
        let service = ValidationService::with_default_config();
        let result = service.validate_input("<script>alert(1)</script>", "comment");
        assert!(!result.is_valid);
        assert!(result.sanitized_input.starts_with("&lt;script"));
        assert!(service.ensure_clean("<script>", "comment").is_err());
    }

    #[test]
    fn flags_sql_injection() {
        let service = ValidationService::with_default_config();
        assert!(!service.validate_input("x' OR '1'='1", "name").is_valid);
        assert!(!service.validate_input("1; DROP TABLE users", "name").is_valid);
    }

    #[test]
    fn validates_email_and_phone() {
        let service = ValidationService::with_default_config();
        assert!(service.validate_email("jane.doe@clinic.org"));
        assert!(!service.validate_email("jane.doe@"));
        assert!(service.validate_phone("+1 (555) 123-4567"));
        assert!(!service.validate_phone("12ab"));
    }
}
