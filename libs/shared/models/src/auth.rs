use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: u64,
    pub iat: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Patient => write!(f, "patient"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated caller, decoded from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Option<UserRole> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(UserRole::Admin)
    }

    pub fn is_doctor(&self) -> bool {
        self.role() == Some(UserRole::Doctor)
    }

    pub fn is_patient(&self) -> bool {
        self.role() == Some(UserRole::Patient)
    }

    pub fn is(&self, id: &uuid::Uuid) -> bool {
        self.id == id.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_ignores_unknown_values() {
        let user = User {
            id: "u1".to_string(),
            email: None,
            role: Some("superuser".to_string()),
            created_at: None,
        };
        assert_eq!(user.role(), None);
        assert!(!user.is_admin());
    }

    #[test]
    fn role_round_trips_through_display() {
        for role in [UserRole::Patient, UserRole::Doctor, UserRole::Admin] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
    }
}
