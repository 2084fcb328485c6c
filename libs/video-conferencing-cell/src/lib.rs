// libs/video-conferencing-cell/src/lib.rs
//! Zoom meetings for online consultations.
//!
//! Meetings are created when an online appointment is confirmed and removed
//! when it is cancelled. Participants fetch their join details through
//! `GET /video/appointments/{appointment_id}`; only the doctor receives the
//! host `start_url`.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::video_conferencing_routes;
pub use services::{MeetingService, ZoomApi, ZoomClient};
