//! Google Maps Geocoding API client.

use reqwest::Client;
use serde::Deserialize;

use super::http::{endpoint, get_text};
use super::{GeocodeError, GeocodeHit, Geocoder};
use crate::models::LatLng;

pub const GOOGLE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode";

pub struct Google {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: Option<String>,
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

impl Google {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn parse_response(body: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let response: GeocodeResponse =
            serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;

        let message = response
            .error_message
            .unwrap_or_else(|| response.status.clone());

        match response.status.as_str() {
            "OK" => Ok(response.results.into_iter().next().map(|r| GeocodeHit {
                location: LatLng::new(r.geometry.location.lat, r.geometry.location.lng),
                label: r.formatted_address,
            })),
            "ZERO_RESULTS" => Ok(None),
            "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(GeocodeError::Unavailable(message)),
            _ => Err(GeocodeError::Rejected {
                status: 200,
                message,
            }),
        }
    }
}

impl Geocoder for Google {
    fn name(&self) -> &str {
        "google"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(GeocodeError::MissingApiKey("google"))?;
        let url = endpoint(&self.base_url, "json", &[("address", address), ("key", key)])?;
        let body = get_text(&self.client, url).await?;
        Self::parse_response(&body)
    }
}
