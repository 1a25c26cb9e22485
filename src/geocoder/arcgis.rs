//! ArcGIS World Geocoding Service client (findAddressCandidates).

use reqwest::Client;
use serde::Deserialize;

use super::http::{endpoint, get_text};
use super::{GeocodeError, GeocodeHit, Geocoder};
use crate::models::LatLng;

pub const ARCGIS_ENDPOINT: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer";

pub struct ArcGis {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    address: Option<String>,
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    x: f64,
    y: f64,
}

/// Errors are reported in the body with HTTP 200
#[derive(Debug, Deserialize)]
struct ServiceError {
    code: i64,
    #[serde(default)]
    message: String,
}

impl ArcGis {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn parse_response(body: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let response: CandidatesResponse =
            serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(if err.code >= 500 {
                GeocodeError::Unavailable(format!("ArcGIS error {}: {}", err.code, err.message))
            } else {
                GeocodeError::Rejected {
                    status: u16::try_from(err.code).unwrap_or(0),
                    message: err.message,
                }
            });
        }

        // Candidates come sorted by score
        Ok(response.candidates.into_iter().next().map(|c| GeocodeHit {
            location: LatLng::new(c.location.y, c.location.x),
            label: c.address,
        }))
    }
}

impl Geocoder for ArcGis {
    fn name(&self) -> &str {
        "arcgis"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let url = endpoint(
            &self.base_url,
            "findAddressCandidates",
            &[("SingleLine", address), ("f", "json"), ("maxLocations", "1")],
        )?;
        let body = get_text(&self.client, url).await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidate_swaps_axes() {
        let body = r#"{
            "spatialReference": {"wkid": 4326},
            "candidates": [
                {"address": "Rua A, Guarujá, São Paulo", "location": {"x": -46.25, "y": -23.99}, "score": 98.5, "attributes": {}}
            ]
        }"#;
        let hit = ArcGis::parse_response(body).unwrap().unwrap();
        assert_eq!(hit.location, LatLng::new(-23.99, -46.25));
        assert_eq!(hit.label.as_deref(), Some("Rua A, Guarujá, São Paulo"));
    }

    #[test]
    fn test_parse_no_candidates() {
        let body = r#"{"spatialReference": {"wkid": 4326}, "candidates": []}"#;
        assert!(ArcGis::parse_response(body).unwrap().is_none());
    }

    #[test]
    fn test_parse_error_body() {
        let body = r#"{"error": {"code": 400, "message": "Invalid or missing input parameters.", "details": []}}"#;
        match ArcGis::parse_response(body) {
            Err(GeocodeError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.starts_with("Invalid"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = r#"{"error": {"code": 500, "message": "Unable to complete operation."}}"#;
        assert!(ArcGis::parse_response(body).unwrap_err().is_transient());
    }
}
