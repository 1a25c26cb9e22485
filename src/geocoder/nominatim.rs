//! OpenStreetMap Nominatim search client.

use reqwest::Client;
use serde::Deserialize;

use super::http::{endpoint, get_text};
use super::{GeocodeError, GeocodeHit, Geocoder};
use crate::models::LatLng;

pub const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

pub struct Nominatim {
    client: Client,
    base_url: String,
}

/// Nominatim serializes coordinates as strings, some mirrors as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Degrees {
    Text(String),
    Number(f64),
}

impl Degrees {
    fn value(&self) -> Result<f64, GeocodeError> {
        match self {
            Degrees::Number(n) => Ok(*n),
            Degrees::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| GeocodeError::Decode(format!("invalid coordinate '{}'", s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: Degrees,
    lon: Degrees,
    display_name: Option<String>,
}

impl Nominatim {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Parse a `format=json` search response
    pub fn parse_response(body: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let places: Vec<NominatimPlace> =
            serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;

        let Some(first) = places.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(GeocodeHit {
            location: LatLng::new(first.lat.value()?, first.lon.value()?),
            label: first.display_name,
        }))
    }
}

impl Geocoder for Nominatim {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let url = endpoint(
            &self.base_url,
            "search",
            &[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
            ],
        )?;
        let body = get_text(&self.client, url).await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_result() {
        let body = r#"[
            {"place_id": 1, "lat": "-23.9935", "lon": "-46.2564", "display_name": "Guarujá, São Paulo, Brasil"},
            {"place_id": 2, "lat": "0", "lon": "0", "display_name": "other"}
        ]"#;
        let hit = Nominatim::parse_response(body).unwrap().unwrap();
        assert_eq!(hit.location, LatLng::new(-23.9935, -46.2564));
        assert_eq!(hit.label.as_deref(), Some("Guarujá, São Paulo, Brasil"));
    }

    #[test]
    fn test_parse_empty_is_no_match() {
        assert!(Nominatim::parse_response("[]").unwrap().is_none());
    }

    #[test]
    fn test_parse_numeric_coordinates() {
        let hit = Nominatim::parse_response(r#"[{"lat": 1.5, "lon": 2.5}]"#)
            .unwrap()
            .unwrap();
        assert_eq!(hit.location, LatLng::new(1.5, 2.5));
        assert!(hit.label.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Nominatim::parse_response(r#"[{"lat": "abc", "lon": "1"}]"#),
            Err(GeocodeError::Decode(_))
        ));
        assert!(matches!(
            Nominatim::parse_response("<html>blocked</html>"),
            Err(GeocodeError::Decode(_))
        ));
    }
}
