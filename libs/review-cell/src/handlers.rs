use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateReviewRequest, ReviewListQuery};
use crate::services::ReviewService;

#[axum::debug_handler]
pub async fn create_review(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let review_service = ReviewService::new(&state);
    let review = review_service.create_review(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": review
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_reviews(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Value>, AppError> {
    let review_service = ReviewService::new(&state);
    let reviews = review_service.list_for_doctor(doctor_id, &query).await?;
    let summary = review_service.rating_summary(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": reviews,
        "average_rating": summary.average,
        "total": summary.count
    })))
}

#[axum::debug_handler]
pub async fn delete_review(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(review_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let review_service = ReviewService::new(&state);
    review_service.delete_review(&user, review_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Review deleted"
    })))
}
