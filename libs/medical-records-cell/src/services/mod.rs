pub mod access;
pub mod document;
pub mod history;

pub use access::RecordAccessService;
pub use document::DocumentService;
pub use history::MedicalHistoryService;
