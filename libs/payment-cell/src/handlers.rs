// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreatePaymentRequest, PaymentListQuery, RefundRequest};
use crate::services::signature::SIGNATURE_HEADER;
use crate::services::PaymentService;

#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let payment_service = PaymentService::new(&state);
    let payment = payment_service.create_payment(&user, request.appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": payment
    })))
}

/// Provider callback. Authenticated by the body signature, not a JWT.
#[axum::debug_handler]
pub async fn payment_webhook(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let payment_service = PaymentService::new(&state);
    let outcome = payment_service.handle_webhook(&body, signature).await?;

    Ok(Json(json!({
        "received": true,
        "outcome": outcome
    })))
}

#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let payment_service = PaymentService::new(&state);
    let payment = payment_service.get_payment(&user, payment_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": payment
    })))
}

#[axum::debug_handler]
pub async fn list_payments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Value>, AppError> {
    let payment_service = PaymentService::new(&state);
    let payments = payment_service.list_payments(&user, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": payments,
        "total": payments.len()
    })))
}

#[axum::debug_handler]
pub async fn refund_payment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
    request: Option<Json<RefundRequest>>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let payment_service = PaymentService::new(&state);
    let payment = payment_service.refund_payment(payment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": payment
    })))
}
