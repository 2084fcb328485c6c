use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{DoctorError, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the address resolves to nothing.
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, DoctorError>;
}

/// Google Maps geocoding API client.
pub struct HttpGeocoder {
    client: Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

impl HttpGeocoder {
    pub fn new(config: &AppConfig) -> Option<Self> {
        if !config.is_maps_configured() {
            return None;
        }

        Some(Self {
            client: Client::new(),
            api_url: config.maps_api_url.clone(),
            api_key: config.maps_api_key.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, DoctorError> {
        debug!("Geocoding clinic address");

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| DoctorError::Geocoding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DoctorError::Geocoding(format!("HTTP {}", response.status())));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| DoctorError::Geocoding(e.to_string()))?;

        match body.status.as_str() {
            "OK" => Ok(body.results.first().map(|r| GeoPoint {
                latitude: r.geometry.location.lat,
                longitude: r.geometry.location.lng,
            })),
            "ZERO_RESULTS" => Ok(None),
            other => {
                warn!("Geocoding returned status {}", other);
                Err(DoctorError::Geocoding(other.to_string()))
            }
        }
    }
}
