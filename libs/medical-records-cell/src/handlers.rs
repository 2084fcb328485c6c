use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateHistoryEntryRequest, DocumentUpload};
use crate::services::{DocumentService, MedicalHistoryService};

// ==============================================================================
// DOCUMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn upload_document(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(upload): Json<DocumentUpload>,
) -> Result<Json<Value>, AppError> {
    let document_service = DocumentService::new(&state)?;
    let document = document_service.upload_document(&user, patient_id, upload).await?;

    Ok(Json(json!({
        "success": true,
        "data": document
    })))
}

#[axum::debug_handler]
pub async fn list_documents(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let document_service = DocumentService::new(&state)?;
    let documents = document_service.list_documents(&user, patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": documents,
        "total": documents.len()
    })))
}

#[axum::debug_handler]
pub async fn get_document(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path((patient_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let document_service = DocumentService::new(&state)?;
    let document = document_service.get_document(&user, patient_id, document_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": document
    })))
}

#[axum::debug_handler]
pub async fn delete_document(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path((patient_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let document_service = DocumentService::new(&state)?;
    document_service.delete_document(&user, patient_id, document_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Document deleted"
    })))
}

// ==============================================================================
// HISTORY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_history(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let history_service = MedicalHistoryService::new(&state);
    let entries = history_service.list_history(&user, patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn add_history_entry(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<CreateHistoryEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let history_service = MedicalHistoryService::new(&state);
    let entry = history_service.add_entry(&user, patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": entry
    })))
}
