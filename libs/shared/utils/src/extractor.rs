use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Pull the bearer token out of an `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let user = validate_token(token, &config.jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub async fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

pub fn require_role(user: &User, role: UserRole) -> Result<(), AppError> {
    require_any_role(user, &[role])
}

pub fn require_any_role(user: &User, roles: &[UserRole]) -> Result<(), AppError> {
    match user.role() {
        Some(role) if roles.contains(&role) => Ok(()),
        _ => Err(AppError::Forbidden(format!(
            "This action requires one of the roles: {}",
            roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// Parse the caller's id; tokens are always issued with UUID subjects.
pub fn user_uuid(user: &User) -> Result<uuid::Uuid, AppError> {
    uuid::Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn user_with_role(role: &str) -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            email: None,
            role: Some(role.to_string()),
            created_at: None,
        }
    }

    #[test]
    fn bearer_token_requires_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_matches!(bearer_token(&headers), Err(AppError::Auth(_)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        assert_matches!(bearer_token(&headers), Err(AppError::Auth(msg)) if msg == "Missing authorization header");
    }

    #[test]
    fn role_guard_is_forbidden_not_unauthorized() {
        let patient = user_with_role("patient");
        assert_matches!(require_role(&patient, UserRole::Admin), Err(AppError::Forbidden(_)));
        assert!(require_any_role(&patient, &[UserRole::Admin, UserRole::Patient]).is_ok());
    }
}
