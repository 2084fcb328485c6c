pub mod admin;
pub mod backup;

pub use admin::AdminService;
pub use backup::BackupService;
