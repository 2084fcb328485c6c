// libs/video-conferencing-cell/src/services/mod.rs

pub mod meeting;
pub mod zoom;

pub use meeting::MeetingService;
pub use zoom::{ZoomApi, ZoomClient};
