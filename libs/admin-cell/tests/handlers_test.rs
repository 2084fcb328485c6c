use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Path, State},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use admin_cell::admin_routes;
use admin_cell::handlers::*;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn call(config: AppConfig, user: &TestUser, method_name: &str, uri: &str) -> (StatusCode, Value) {
    let token = JwtTestUtils::create_test_token(user, &config.jwt_secret, None);
    let response = admin_routes(Arc::new(config))
        .oneshot(
            Request::builder()
                .method(method_name)
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_non_admin_is_forbidden_everywhere() {
    let config = TestConfig::default().to_app_config();
    let doctor = TestUser::doctor("doctor@example.com");

    for (verb, uri) in [("GET", "/users"), ("GET", "/stats"), ("POST", "/backups")] {
        let (status, _) = call(config.clone(), &doctor, verb, uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", verb, uri);
    }
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let config = TestConfig::default().to_arc();

    let response = admin_routes(config)
        .oneshot(Request::builder().uri("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_users_filters_by_role() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let doctor = TestUser::doctor("doctor@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_response(&doctor.id, &doctor.email, "doctor", "ignored")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = call(config, &admin, "GET", "/users?role=doctor").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["data"][0].get("password_hash").is_none());
}

#[tokio::test]
async fn test_deactivate_user() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));
    let admin = TestUser::admin("admin@example.com");
    let patient = TestUser::patient("patient@example.com");

    let mut row = MockSupabaseResponses::user_response(&patient.id, &patient.email, "patient", "ignored");
    row["is_active"] = json!(false);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", patient.id)))
        .and(body_partial_json(json!({ "is_active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = deactivate_user(State(config), Extension(admin.to_user()), Path(patient.uuid()))
        .await
        .unwrap()
        .0;

    assert_eq!(response["data"]["is_active"], false);
}

#[tokio::test]
async fn test_admin_cannot_deactivate_self() {
    let config = TestConfig::default().to_arc();
    let admin = TestUser::admin("admin@example.com");

    let result = deactivate_user(State(config), Extension(admin.to_user()), Path(admin.uuid())).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = activate_user(State(config), Extension(admin.to_user()), Path(Uuid::new_v4())).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn test_verify_doctor_defaults_to_verified() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));
    let doctor = TestUser::doctor("doctor@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_profiles"))
        .and(query_param("user_id", format!("eq.{}", doctor.id)))
        .and(body_partial_json(json!({ "is_verified": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&doctor.id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = verify_doctor(State(config), Path(doctor.uuid()), None).await.unwrap().0;

    assert_eq!(response["data"]["is_verified"], true);
}

#[tokio::test]
async fn test_stats_aggregate_counts_and_revenue() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(header("prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-0/4")
                .set_body_json(json!([])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "*/2")
                .set_body_json(json!([])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "amount": 150.0, "refunded_amount": 0.0 },
            { "amount": 100.0, "refunded_amount": 40.0 }
        ])))
        .mount(&mock_server)
        .await;

    let response = platform_stats(State(config)).await.unwrap().0;

    assert_eq!(response["data"]["users_by_role"]["doctor"], 4);
    assert_eq!(response["data"]["appointments_by_status"]["rejected"], 2);
    assert_eq!(response["data"]["revenue"], 210.0);
    assert_eq!(response["data"]["refunded"], 40.0);
}

#[tokio::test]
async fn test_stats_revenue_pages_through_payments() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_base_url(&mock_server.uri()));

    for table in ["/rest/v1/users", "/rest/v1/appointments"] {
        Mock::given(method("GET"))
            .and(path(table))
            .and(header("prefer", "count=exact"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-range", "*/0")
                    .set_body_json(json!([])),
            )
            .mount(&mock_server)
            .await;
    }

    let full_page: Vec<Value> = (0..1000)
        .map(|_| json!({ "amount": 10.0, "refunded_amount": 0.0 }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("limit", "1000"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("limit", "1000"))
        .and(query_param("offset", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "amount": 100.0, "refunded_amount": 40.0 }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = platform_stats(State(config)).await.unwrap().0;

    assert_eq!(response["data"]["revenue"], 10060.0);
    assert_eq!(response["data"]["refunded"], 40.0);
}

#[tokio::test]
async fn test_backups_unconfigured_is_internal_error() {
    let config = TestConfig::default().to_arc();

    let result = list_backups(State(config)).await;

    assert_matches!(result, Err(AppError::Internal(_)));
}

#[tokio::test]
async fn test_list_backups_reads_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("medibook-20240101-000000.dump"), b"dump").unwrap();

    let mut config = TestConfig::default().to_app_config();
    config.database_url = "postgres://localhost/medibook".to_string();
    config.backup_dir = dir.path().display().to_string();

    let response = list_backups(State(Arc::new(config))).await.unwrap().0;

    assert_eq!(response["total"], 1);
    assert_eq!(response["data"][0]["file_name"], "medibook-20240101-000000.dump");
}
