use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use shared_models::auth::{JwtClaims, User, UserRole};

/// Issue an HS256 access token for a user.
pub fn issue_token(
    user_id: &str,
    email: &str,
    role: UserRole,
    jwt_secret: &str,
    expiry_hours: i64,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        exp: (now + Duration::hours(expiry_hours)).timestamp().max(0) as u64,
        iat: Some(now.timestamp() as u64),
        email: Some(email.to_string()),
        role: Some(role.to_string()),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign token: {}", e))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_aud = false;

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => "Token expired".to_string(),
            ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
            _ => "Invalid token format".to_string(),
        }
    })?;

    let claims = data.claims;
    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}
