use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Path, Query, State},
    http::{Request, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::RefundProcessor;
use payment_cell::handlers::*;
use payment_cell::{payment_routes, sign_payload, CreatePaymentRequest, PaymentListQuery, PaymentService, RefundRequest};
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

struct Fixture {
    server: MockServer,
    config: Arc<AppConfig>,
    patient: TestUser,
    doctor: TestUser,
    admin: TestUser,
}

impl Fixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = Arc::new(TestConfig::with_base_url(&server.uri()));

        Mock::given(method("POST"))
            .and(path("/rest/v1/notifications"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                MockSupabaseResponses::notification_response(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), false)
            ])))
            .mount(&server)
            .await;

        Self {
            server,
            config,
            patient: TestUser::patient("patient@example.com"),
            doctor: TestUser::doctor("doctor@example.com"),
            admin: TestUser::admin("admin@example.com"),
        }
    }

    fn appointment(&self, id: Uuid, status: &str) -> Value {
        let mut row = MockSupabaseResponses::appointment_response(
            &id.to_string(),
            &self.patient.id,
            &self.doctor.id,
            status,
            Utc::now() + Duration::days(2),
        );
        row["consultation_type"] = json!("in_person");
        row
    }

    async fn mount_appointment(&self, id: Uuid, status: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([self.appointment(id, status)])))
            .mount(&self.server)
            .await;
    }

    fn payment(&self, payment_id: Uuid, appointment_id: Uuid, status: &str) -> Value {
        MockSupabaseResponses::payment_response(
            &payment_id.to_string(),
            &appointment_id.to_string(),
            &self.patient.id,
            status,
        )
    }

    async fn mount_payment_by_intent(&self, payment: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/payments"))
            .and(query_param("provider_reference", "eq.pi_test_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment])))
            .mount(&self.server)
            .await;
    }

    async fn send_webhook(&self, event: Value) -> (StatusCode, Value) {
        let body = serde_json::to_vec(&event).unwrap();
        let signature = sign_payload("whsec_test", &body).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-signature", signature)
            .body(Body::from(body))
            .unwrap();

        let response = payment_routes(self.config.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

fn event(event_type: &str) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "payment_intent_id": "pi_test_123", "failure_reason": "insufficient_funds" }
    })
}

// ==============================================================================
// CHECKOUT
// ==============================================================================

#[tokio::test]
async fn test_create_payment_opens_intent_for_fee() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "payment_pending").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_partial_json(json!({ "amount": 15000, "currency": "usd" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_test_123",
            "client_secret": "pi_test_123_secret",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({
            "appointment_id": appointment_id,
            "status": "pending",
            "provider_reference": "pi_test_123"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            fx.payment(Uuid::new_v4(), appointment_id, "pending")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = create_payment(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Json(CreatePaymentRequest { appointment_id }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response["data"]["status"], "pending");
    assert_eq!(response["data"]["client_secret"], "pi_test_123_secret");
}

#[tokio::test]
async fn test_create_payment_requires_accepted_appointment() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "awaiting_acceptance").await;

    let result = create_payment(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Json(CreatePaymentRequest { appointment_id }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_create_payment_for_someone_elses_appointment_is_forbidden() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "payment_pending").await;
    let stranger = TestUser::patient("stranger@example.com");

    let result = create_payment(
        State(fx.config.clone()),
        Extension(stranger.to_user()),
        Json(CreatePaymentRequest { appointment_id }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_second_payment_for_appointment_conflicts() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "payment_pending").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(Uuid::new_v4(), appointment_id, "pending")
        ])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;

    let result = create_payment(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Json(CreatePaymentRequest { appointment_id }),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

// ==============================================================================
// WEBHOOKS
// ==============================================================================

#[tokio::test]
async fn test_webhook_with_bad_signature_is_rejected() {
    let fx = Fixture::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-signature", "deadbeef")
        .body(Body::from(event("payment.succeeded").to_string()))
        .unwrap();

    let response = payment_routes(fx.config.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_without_signature_is_rejected() {
    let fx = Fixture::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .body(Body::from(event("payment.succeeded").to_string()))
        .unwrap();

    let response = payment_routes(fx.config.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_succeeded_webhook_confirms_appointment() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let payment_id = Uuid::new_v4();
    fx.mount_payment_by_intent(fx.payment(payment_id, appointment_id, "pending")).await;
    fx.mount_appointment(appointment_id, "payment_pending").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", payment_id)))
        .and(body_partial_json(json!({ "status": "succeeded" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "succeeded")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.payment_pending"))
        .and(body_partial_json(json!({ "status": "confirmed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.appointment(appointment_id, "confirmed")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.send_webhook(event("payment.succeeded")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "processed");
}

#[tokio::test]
async fn test_replayed_succeeded_webhook_is_duplicate() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_payment_by_intent(fx.payment(Uuid::new_v4(), appointment_id, "succeeded")).await;
    fx.mount_appointment(appointment_id, "confirmed").await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.send_webhook(event("payment.succeeded")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");
}

#[tokio::test]
async fn test_success_for_appointment_no_longer_payable_is_refunded() {
    for appointment_status in ["cancelled", "rejected", "awaiting_acceptance"] {
        let fx = Fixture::new().await;
        let appointment_id = Uuid::new_v4();
        let payment_id = Uuid::new_v4();
        fx.mount_payment_by_intent(fx.payment(payment_id, appointment_id, "pending")).await;
        fx.mount_appointment(appointment_id, appointment_status).await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/payments"))
            .and(query_param("status", "in.(pending,failed)"))
            .and(body_partial_json(json!({ "status": "succeeded" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                fx.payment(payment_id, appointment_id, "succeeded")
            ])))
            .expect(1)
            .mount(&fx.server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(body_partial_json(json!({ "payment_intent": "pi_test_123", "amount": 15000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "re_1", "status": "succeeded" })))
            .expect(1)
            .mount(&fx.server)
            .await;

        let mut refunded = fx.payment(payment_id, appointment_id, "refunded");
        refunded["refunded_amount"] = json!(150.0);
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/payments"))
            .and(query_param("status", "eq.succeeded"))
            .and(body_partial_json(json!({ "status": "refunded", "refunded_amount": 150.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([refunded])))
            .expect(1)
            .mount(&fx.server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&fx.server)
            .await;

        let (status, body) = fx.send_webhook(event("payment.succeeded")).await;

        assert_eq!(status, StatusCode::OK, "appointment {}", appointment_status);
        assert_eq!(body["outcome"], "processed");
    }
}

#[tokio::test]
async fn test_replayed_success_retries_refund_for_cancelled_appointment() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let payment_id = Uuid::new_v4();
    fx.mount_payment_by_intent(fx.payment(payment_id, appointment_id, "succeeded")).await;
    fx.mount_appointment(appointment_id, "cancelled").await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "re_2", "status": "succeeded" })))
        .expect(1)
        .mount(&fx.server)
        .await;

    let mut refunded = fx.payment(payment_id, appointment_id, "refunded");
    refunded["refunded_amount"] = json!(150.0);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(query_param("status", "eq.succeeded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([refunded])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.send_webhook(event("payment.succeeded")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");
}

#[tokio::test]
async fn test_replayed_success_for_completed_appointment_changes_nothing() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_payment_by_intent(fx.payment(Uuid::new_v4(), appointment_id, "succeeded")).await;
    fx.mount_appointment(appointment_id, "completed").await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.send_webhook(event("payment.succeeded")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");
}

#[tokio::test]
async fn test_failed_webhook_marks_payment_failed() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let payment_id = Uuid::new_v4();
    fx.mount_payment_by_intent(fx.payment(payment_id, appointment_id, "pending")).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "failed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "failed")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let (status, body) = fx.send_webhook(event("payment.failed")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "processed");
}

#[tokio::test]
async fn test_unknown_event_type_is_ignored() {
    let fx = Fixture::new().await;

    let (status, body) = fx.send_webhook(event("charge.dispute.created")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
}

// ==============================================================================
// QUERIES & REFUNDS
// ==============================================================================

#[tokio::test]
async fn test_doctor_cannot_list_payments() {
    let fx = Fixture::new().await;

    let result = list_payments(
        State(fx.config.clone()),
        Extension(fx.doctor.to_user()),
        Query(PaymentListQuery::default()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_patient_cannot_view_foreign_payment() {
    let fx = Fixture::new().await;
    let payment_id = Uuid::new_v4();
    let mut row = fx.payment(payment_id, Uuid::new_v4(), "succeeded");
    row["patient_id"] = json!(Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", payment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&fx.server)
        .await;

    let result = get_payment(State(fx.config.clone()), Extension(fx.patient.to_user()), Path(payment_id)).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_admin_full_refund_marks_payment_refunded() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let payment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", payment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "succeeded")
        ])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(body_partial_json(json!({ "payment_intent": "pi_test_123", "amount": 15000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "re_1", "status": "succeeded" })))
        .expect(1)
        .mount(&fx.server)
        .await;

    let mut refunded = fx.payment(payment_id, appointment_id, "refunded");
    refunded["refunded_amount"] = json!(150.0);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({ "status": "refunded", "refunded_amount": 150.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([refunded])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = refund_payment(
        State(fx.config.clone()),
        Extension(fx.admin.to_user()),
        Path(payment_id),
        None,
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response["data"]["status"], "refunded");
}

#[tokio::test]
async fn test_refund_above_remaining_amount_is_rejected() {
    let fx = Fixture::new().await;
    let payment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", payment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, Uuid::new_v4(), "succeeded")
        ])))
        .mount(&fx.server)
        .await;

    let result = refund_payment(
        State(fx.config.clone()),
        Extension(fx.admin.to_user()),
        Path(payment_id),
        Some(Json(RefundRequest {
            amount: Some(500.0),
            reason: None,
        })),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_patient_cannot_issue_refund() {
    let fx = Fixture::new().await;

    let result = refund_payment(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Path(Uuid::new_v4()),
        None,
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_refund_processor_without_succeeded_payment_is_noop() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("status", "eq.succeeded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let service: Arc<dyn RefundProcessor> = Arc::new(PaymentService::new(&fx.config));
    let refunded = service.refund_for_appointment(Uuid::new_v4()).await.unwrap();

    assert!(!refunded);
}

#[tokio::test]
async fn test_void_cancels_intent_and_fails_pending_payment() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let payment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "pending")
        ])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_test_123/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "pi_test_123", "status": "canceled" })))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", payment_id)))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "failed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "failed")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let service: Arc<dyn RefundProcessor> = Arc::new(PaymentService::new(&fx.config));
    let voided = service.void_pending_for_appointment(appointment_id).await.unwrap();

    assert!(voided);
}

#[tokio::test]
async fn test_void_still_fails_payment_when_intent_cancel_errors() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    let payment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "pending")
        ])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_test_123/cancel"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "intent already succeeded" })))
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({ "status": "failed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fx.payment(payment_id, appointment_id, "failed")
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let voided = PaymentService::new(&fx.config)
        .void_pending_for_appointment(appointment_id)
        .await
        .unwrap();

    assert!(voided);
}

#[tokio::test]
async fn test_void_without_pending_payment_is_noop() {
    let fx = Fixture::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let service: Arc<dyn RefundProcessor> = Arc::new(PaymentService::new(&fx.config));
    let voided = service.void_pending_for_appointment(Uuid::new_v4()).await.unwrap();

    assert!(!voided);
}
