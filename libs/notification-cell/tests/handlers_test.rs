use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Path, Query, State},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::handlers::*;
use notification_cell::{notification_routes, NotificationListQuery, NotificationService, NotificationType};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn mount_insert(server: &MockServer, user: &TestUser) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_response(&Uuid::new_v4().to_string(), &user.id, false)
        ])))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_recipient(server: &MockServer, user: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "email": user.email,
            "phone": null,
            "first_name": "Ada"
        }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_notify_stores_and_emails() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::with_base_url(&mock_server.uri());
    config.email_api_key = "email-key".to_string();
    let patient = TestUser::patient("patient@example.com");

    mount_insert(&mock_server, &patient).await;
    mount_recipient(&mock_server, &patient).await;

    Mock::given(method("POST"))
        .and(path("/email/send"))
        .and(header("authorization", "Bearer email-key"))
        .and(body_partial_json(json!({
            "to": "patient@example.com",
            "subject": "Appointment accepted"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let notification = NotificationService::new(&config)
        .notify(
            patient.uuid(),
            NotificationType::AppointmentAccepted,
            "Appointment accepted",
            "Your appointment was accepted",
        )
        .await
        .unwrap();

    assert_eq!(notification.notification_type, NotificationType::AppointmentAccepted);
    assert!(!notification.is_read);
}

#[tokio::test]
async fn test_dispatch_failure_is_not_propagated() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::with_base_url(&mock_server.uri());
    config.email_api_key = "email-key".to_string();
    let patient = TestUser::patient("patient@example.com");

    mount_insert(&mock_server, &patient).await;
    mount_recipient(&mock_server, &patient).await;

    Mock::given(method("POST"))
        .and(path("/email/send"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = NotificationService::new(&config)
        .notify(patient.uuid(), NotificationType::System, "Hello", "World")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_sms_skipped_without_phone() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::with_base_url(&mock_server.uri());
    config.sms_api_key = "sms-key".to_string();
    let patient = TestUser::patient("patient@example.com");

    mount_insert(&mock_server, &patient).await;
    mount_recipient(&mock_server, &patient).await;

    Mock::given(method("POST"))
        .and(path("/sms/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    NotificationService::new(&config)
        .notify(patient.uuid(), NotificationType::System, "Hello", "World")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_unread_only() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", patient.id)))
        .and(query_param("is_read", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::notification_response(&Uuid::new_v4().to_string(), &patient.id, false)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = NotificationListQuery {
        unread_only: Some(true),
        ..Default::default()
    };

    let response = list_notifications(State(config), Extension(patient.to_user()), Query(query))
        .await
        .unwrap()
        .0;

    assert_eq!(response["total"], 1);
    assert_eq!(response["data"][0]["is_read"], false);
}

#[tokio::test]
async fn test_unread_count_uses_exact_count() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(header("prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-0/7")
                .set_body_json(json!([{ "id": Uuid::new_v4() }])),
        )
        .mount(&mock_server)
        .await;

    let response = unread_count(State(config), Extension(patient.to_user()))
        .await
        .unwrap()
        .0;

    assert_eq!(response["unread_count"], 7);
}

#[tokio::test]
async fn test_mark_read_of_foreign_notification_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = mark_read(State(config), Extension(patient.to_user()), Path(Uuid::new_v4())).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn test_routes_require_auth() {
    let app = notification_routes(TestConfig::default().to_arc());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mark_all_read_through_router() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("is_read", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::notification_response(&Uuid::new_v4().to_string(), &patient.id, true),
            MockSupabaseResponses::notification_response(&Uuid::new_v4().to_string(), &patient.id, true)
        ])))
        .mount(&mock_server)
        .await;

    let response = notification_routes(Arc::new(config))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/read-all")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["updated"], 2);
}
