use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::{Request, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use review_cell::handlers::*;
use review_cell::{review_routes, CreateReviewRequest};
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

struct Fixture {
    server: MockServer,
    config: Arc<AppConfig>,
    patient: TestUser,
    doctor: TestUser,
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
        }
    }

    async fn mount_appointment(&self, id: Uuid, status: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::appointment_response(
                    &id.to_string(),
                    &self.patient.id,
                    &self.doctor.id,
                    status,
                    Utc::now() - Duration::days(1),
                )
            ])))
            .mount(&self.server)
            .await;
    }

    async fn mount_ratings(&self, ratings: &[i32]) {
        let rows: Vec<_> = ratings.iter().map(|r| json!({ "rating": r })).collect();
        Mock::given(method("GET"))
            .and(path("/rest/v1/reviews"))
            .and(query_param("select", "rating"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }
}

fn request(appointment_id: Uuid, rating: i32) -> CreateReviewRequest {
    CreateReviewRequest {
        appointment_id,
        rating,
        comment: Some("  Very helpful  ".to_string()),
    }
}

#[tokio::test]
async fn test_review_of_completed_appointment_updates_rating() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "completed").await;
    fx.mount_ratings(&[5, 4]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reviews"))
        .and(body_partial_json(json!({ "rating": 5, "comment": "Very helpful", "doctor_id": fx.doctor.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::review_response(
                &Uuid::new_v4().to_string(),
                &appointment_id.to_string(),
                &fx.patient.id,
                &fx.doctor.id,
                5,
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_profiles"))
        .and(query_param("user_id", format!("eq.{}", fx.doctor.id)))
        .and(body_partial_json(json!({ "rating": 4.5, "review_count": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&fx.doctor.id)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = create_review(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Json(request(appointment_id, 5)),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response["data"]["rating"], 5);
}

#[tokio::test]
async fn test_rating_out_of_range_is_rejected() {
    let fx = Fixture::new().await;

    for rating in [0, 6] {
        let result = create_review(
            State(fx.config.clone()),
            Extension(fx.patient.to_user()),
            Json(request(Uuid::new_v4(), rating)),
        )
        .await;
        assert_matches!(result, Err(AppError::ValidationError(_)));
    }
}

#[tokio::test]
async fn test_unfinished_appointment_cannot_be_reviewed() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "confirmed").await;

    let result = create_review(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Json(request(appointment_id, 4)),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_second_review_conflicts() {
    let fx = Fixture::new().await;
    let appointment_id = Uuid::new_v4();
    fx.mount_appointment(appointment_id, "completed").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reviews"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(MockSupabaseResponses::error_response("duplicate key value", "23505")),
        )
        .mount(&fx.server)
        .await;

    let result = create_review(
        State(fx.config.clone()),
        Extension(fx.patient.to_user()),
        Json(request(appointment_id, 4)),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn test_doctor_cannot_write_reviews() {
    let fx = Fixture::new().await;

    let result = create_review(
        State(fx.config.clone()),
        Extension(fx.doctor.to_user()),
        Json(request(Uuid::new_v4(), 5)),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_doctor_reviews_are_public() {
    let fx = Fixture::new().await;
    fx.mount_ratings(&[3, 5]).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    let request = Request::builder()
        .uri(format!("/doctors/{}", fx.doctor.id))
        .body(Body::empty())
        .unwrap();
    let response = review_routes(fx.config.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_only_author_or_admin_deletes_review() {
    let fx = Fixture::new().await;
    let review_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", format!("eq.{}", review_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::review_response(
                &review_id.to_string(),
                &Uuid::new_v4().to_string(),
                &fx.patient.id,
                &fx.doctor.id,
                2,
            )
        ])))
        .mount(&fx.server)
        .await;

    let stranger = TestUser::patient("stranger@example.com");
    let result = delete_review(State(fx.config.clone()), Extension(stranger.to_user()), Path(review_id)).await;
    assert_matches!(result, Err(AppError::Forbidden(_)));

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/reviews"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&fx.server)
        .await;
    fx.mount_ratings(&[]).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_profiles"))
        .and(body_partial_json(json!({ "rating": 0.0, "review_count": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&fx.doctor.id)
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let result = delete_review(State(fx.config.clone()), Extension(fx.patient.to_user()), Path(review_id)).await;
    assert!(result.is_ok());
}
