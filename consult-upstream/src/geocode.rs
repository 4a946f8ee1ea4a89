use consult_core::Coordinates;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, UpstreamError};
use crate::http::{send_json, trim_base};

const SERVICE: &str = "geocoding";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    status: String,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Address to coordinates via the Google Geocoding API
pub struct Geocoder {
    http: Client,
    base_url: String,
    api_key: String,
}

impl Geocoder {
    pub fn new(http: Client, base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
        }
    }

    /// Coordinates of the first match for `address`
    pub async fn geocode(&self, address: &str) -> Result<Coordinates> {
        let request = self
            .http
            .get(format!("{}/maps/api/geocode/json", self.base_url))
            .query(&[("address", address), ("key", self.api_key.as_str())]);
        let response: GeocodeResponse = send_json(SERVICE, request).await?;

        if response.status != "OK" && response.status != "ZERO_RESULTS" {
            return Err(UpstreamError::malformed(
                SERVICE,
                format!(
                    "status {}: {}",
                    response.status,
                    response.error_message.unwrap_or_default()
                ),
            ));
        }

        let first = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| {
                UpstreamError::malformed(SERVICE, "no results for the patient's address")
            })?;

        Ok(Coordinates {
            latitude: first.geometry.location.lat,
            longitude: first.geometry.location.lng,
        })
    }
}
