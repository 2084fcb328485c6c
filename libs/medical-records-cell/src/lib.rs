// =====================================================================================
// MEDICAL RECORDS CELL - ENCRYPTED DOCUMENTS & MEDICAL HISTORY
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::medical_records_routes;
pub use services::{DocumentService, MedicalHistoryService, RecordAccessService};
