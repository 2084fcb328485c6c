use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use security_cell::EncryptionService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    DocumentContent, DocumentUpload, MedicalDocument, MedicalRecordsError, ALLOWED_CONTENT_TYPES,
    MAX_DOCUMENT_BYTES,
};
use crate::services::access::RecordAccessService;

const DOCUMENTS_TABLE: &str = "medical_documents";
const DOCUMENTS_BUCKET: &str = "medical-documents";
const CIPHERTEXT_CONTENT_TYPE: &str = "application/octet-stream";

pub struct DocumentService {
    supabase: SupabaseClient,
    access: RecordAccessService,
    encryption: EncryptionService,
}

impl DocumentService {
    pub fn new(config: &AppConfig) -> Result<Self, MedicalRecordsError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            access: RecordAccessService::new(config),
            encryption: EncryptionService::new(&config.encryption_key)?,
        })
    }

    /// Validates, encrypts and stores a document, then records its metadata.
    #[instrument(skip(self, user, upload), fields(user_id = %user.id))]
    pub async fn upload_document(
        &self,
        user: &User,
        patient_id: Uuid,
        upload: DocumentUpload,
    ) -> Result<MedicalDocument, MedicalRecordsError> {
        self.access.ensure_can_access(user, patient_id).await?;

        let title = upload.title.trim();
        if title.is_empty() {
            return Err(MedicalRecordsError::ValidationError("Document title cannot be empty".to_string()));
        }
        let content_type = upload.content_type.trim().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(MedicalRecordsError::UnsupportedContentType(content_type));
        }

        let bytes = decode_file_data(&upload.file_data)?;
        let uploaded_by = Uuid::parse_str(&user.id)
            .map_err(|_| MedicalRecordsError::AccessDenied("Invalid user id".to_string()))?;

        let encrypted = self.encryption.encrypt(&bytes)?;
        let document_id = Uuid::new_v4();
        let file_path = format!("{}/{}", patient_id, document_id);

        self.supabase
            .upload_object(DOCUMENTS_BUCKET, &file_path, encrypted.ciphertext, CIPHERTEXT_CONTENT_TYPE)
            .await?;
        debug!("Stored {} encrypted bytes at {}", bytes.len(), file_path);

        let inserted = self
            .supabase
            .insert::<MedicalDocument>(
                DOCUMENTS_TABLE,
                json!({
                    "id": document_id,
                    "patient_id": patient_id,
                    "uploaded_by": uploaded_by,
                    "title": title,
                    "document_type": upload.document_type,
                    "file_path": file_path,
                    "content_type": content_type,
                    "size_bytes": bytes.len(),
                    "nonce": encrypted.nonce,
                }),
            )
            .await;

        match inserted {
            Ok(document) => {
                info!("Uploaded document {} for patient {}", document.id, patient_id);
                Ok(document)
            }
            Err(e) => {
                if let Err(cleanup) = self.supabase.delete_object(DOCUMENTS_BUCKET, &file_path).await {
                    warn!("Failed to remove orphaned object {}: {}", file_path, cleanup);
                }
                Err(e.into())
            }
        }
    }

    pub async fn list_documents(&self, user: &User, patient_id: Uuid) -> Result<Vec<MedicalDocument>, MedicalRecordsError> {
        self.access.ensure_can_access(user, patient_id).await?;

        let query = format!("patient_id=eq.{}&order=created_at.desc", patient_id);
        Ok(self.supabase.select(DOCUMENTS_TABLE, &query).await?)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn get_document(
        &self,
        user: &User,
        patient_id: Uuid,
        document_id: Uuid,
    ) -> Result<DocumentContent, MedicalRecordsError> {
        self.access.ensure_can_access(user, patient_id).await?;

        let document = self.fetch(patient_id, document_id).await?;
        let ciphertext = self.supabase.download_object(DOCUMENTS_BUCKET, &document.file_path).await?;
        let plaintext = self.encryption.decrypt(&ciphertext, &document.nonce)?;

        Ok(DocumentContent {
            file_data: BASE64.encode(plaintext),
            document,
        })
    }

    /// Only the uploader or an admin may delete.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete_document(
        &self,
        user: &User,
        patient_id: Uuid,
        document_id: Uuid,
    ) -> Result<(), MedicalRecordsError> {
        let document = self.fetch(patient_id, document_id).await?;
        if !user.is_admin() && !user.is(&document.uploaded_by) {
            return Err(MedicalRecordsError::AccessDenied(
                "Only the uploader or an admin can delete a document".to_string(),
            ));
        }

        self.supabase
            .delete(DOCUMENTS_TABLE, &format!("id=eq.{}", document.id))
            .await?;
        if let Err(e) = self.supabase.delete_object(DOCUMENTS_BUCKET, &document.file_path).await {
            warn!("Document {} deleted but object removal failed: {}", document.id, e);
        }

        info!("Deleted document {} of patient {}", document.id, patient_id);
        Ok(())
    }

    async fn fetch(&self, patient_id: Uuid, document_id: Uuid) -> Result<MedicalDocument, MedicalRecordsError> {
        self.supabase
            .select_one(
                DOCUMENTS_TABLE,
                &format!("id=eq.{}&patient_id=eq.{}", document_id, patient_id),
            )
            .await?
            .ok_or(MedicalRecordsError::NotFound)
    }
}

/// Accepts raw base64 or a `data:<type>;base64,` URL.
fn decode_file_data(file_data: &str) -> Result<Vec<u8>, MedicalRecordsError> {
    let encoded = match file_data.split_once(";base64,") {
        Some((_, data)) => data,
        None => file_data,
    };

    // Reject before decoding anything that cannot fit the limit.
    if encoded.len() / 4 * 3 > MAX_DOCUMENT_BYTES + 3 {
        return Err(MedicalRecordsError::TooLarge {
            max_bytes: MAX_DOCUMENT_BYTES,
        });
    }

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| MedicalRecordsError::InvalidDocument(format!("file_data is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(MedicalRecordsError::InvalidDocument("file is empty".to_string()));
    }
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(MedicalRecordsError::TooLarge {
            max_bytes: MAX_DOCUMENT_BYTES,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decodes_data_url() {
        let bytes = decode_file_data("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn rejects_invalid_base64() {
        assert_matches!(decode_file_data("%%%"), Err(MedicalRecordsError::InvalidDocument(_)));
    }

    #[test]
    fn rejects_empty_file() {
        assert_matches!(decode_file_data(""), Err(MedicalRecordsError::InvalidDocument(_)));
    }

    #[test]
    fn rejects_oversized_file() {
        let encoded = BASE64.encode(vec![0u8; MAX_DOCUMENT_BYTES + 1]);
        assert_matches!(decode_file_data(&encoded), Err(MedicalRecordsError::TooLarge { .. }));
    }

    #[test]
    fn accepts_file_at_limit() {
        let encoded = BASE64.encode(vec![7u8; MAX_DOCUMENT_BYTES]);
        assert_eq!(decode_file_data(&encoded).unwrap().len(), MAX_DOCUMENT_BYTES);
    }
}
