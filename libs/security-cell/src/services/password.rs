// =====================================================================================
// PASSWORD SECURITY SERVICE
// =====================================================================================

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::{debug, instrument};

use crate::models::{PasswordStrength, PasswordStrengthResult, SecurityError};

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

const COMMON_PASSWORDS: [&str; 12] = [
    "password", "123456", "qwerty", "letmein", "welcome", "monkey",
    "dragon", "abc123", "111111", "admin", "iloveyou", "medibook",
];

pub struct PasswordSecurityService;

impl PasswordSecurityService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, SecurityError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| SecurityError::HashingError(e.to_string()))
    }

    /// `Ok(false)` for a wrong password; `Err` only for an unparseable stored hash.
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, SecurityError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| SecurityError::HashingError(e.to_string()))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(SecurityError::HashingError(e.to_string())),
        }
    }

    #[instrument(skip(password))]
    pub fn validate_password_strength(password: &str) -> PasswordStrengthResult {
        let mut score = 0u8;
        let mut issues = Vec::new();

        if password.len() >= 12 {
            score += 25;
        } else if password.len() >= 8 {
            score += 15;
            issues.push("Password should be at least 12 characters long".to_string());
        } else {
            issues.push("Password must be at least 8 characters long".to_string());
        }

        if password.chars().any(|c| c.is_lowercase()) {
            score += 15;
        } else {
            issues.push("Password should contain lowercase letters".to_string());
        }

        if password.chars().any(|c| c.is_uppercase()) {
            score += 15;
        } else {
            issues.push("Password should contain uppercase letters".to_string());
        }

        if password.chars().any(|c| c.is_numeric()) {
            score += 15;
        } else {
            issues.push("Password should contain numbers".to_string());
        }

        if password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            score += 15;
        } else {
            issues.push("Password should contain special characters".to_string());
        }

        if Self::has_sequential_chars(password) {
            score = score.saturating_sub(20);
            issues.push("Avoid sequential characters (abc, 123)".to_string());
        }

        if Self::has_repeated_chars(password) {
            score = score.saturating_sub(15);
            issues.push("Avoid repeated characters (aaa, 111)".to_string());
        }

        let lowered = password.to_lowercase();
        if COMMON_PASSWORDS.iter().any(|common| lowered.contains(common)) {
            score = score.saturating_sub(50);
            issues.push("Password contains common patterns".to_string());
        }

        // An 8+ character floor applies regardless of the score
        let strength = if password.len() < 8 {
            PasswordStrength::Weak
        } else {
            match score {
                0..=25 => PasswordStrength::Weak,
                26..=50 => PasswordStrength::Fair,
                51..=75 => PasswordStrength::Good,
                _ => PasswordStrength::Strong,
            }
        };

        debug!("Password scored {} ({:?})", score, strength);

        PasswordStrengthResult {
            strength,
            score,
            issues,
        }
    }

    /// Validate and hash in one step; used by registration and password changes.
    pub fn hash_if_acceptable(password: &str) -> Result<String, SecurityError> {
        let strength = Self::validate_password_strength(password);
        if !strength.is_acceptable() {
            return Err(SecurityError::WeakPassword(strength.issues));
        }
        Self::hash_password(password)
    }

    fn has_sequential_chars(password: &str) -> bool {
        let chars: Vec<u32> = password.chars().map(|c| c as u32).collect();

        chars.windows(3).any(|w| {
            let ascending = w[1] == w[0] + 1 && w[2] == w[1] + 1;
            let descending = w[0] == w[1] + 1 && w[1] == w[2] + 1;
            ascending || descending
        })
    }

    fn has_repeated_chars(password: &str) -> bool {
        let chars: Vec<char> = password.chars().collect();
        chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
    }

    pub fn get_password_recommendations() -> Vec<String> {
        vec![
            "Use at least 12 characters".to_string(),
            "Include uppercase and lowercase letters".to_string(),
            "Include numbers and special characters".to_string(),
            "Avoid common words and patterns".to_string(),
        ]
    }
}
