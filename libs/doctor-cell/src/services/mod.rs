pub mod availability;
pub mod doctor;
pub mod geo;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use geo::{haversine_km, Geocoder, HttpGeocoder};
