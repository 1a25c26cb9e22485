//! TOML configuration shared by the binaries.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration. Command line flags override what is loaded here.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::address::AddressTemplate;
use crate::geocoder::{RetryPolicy, ARCGIS_ENDPOINT, GOOGLE_ENDPOINT, NOMINATIM_ENDPOINT};

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub geocoding: GeocodingConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub map: MapConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Providers in fallback order: osm, arcgis, google
    pub providers: Vec<String>,
    /// Calls per provider before moving on
    pub attempts: u32,
    pub retry_delay_ms: u64,
    /// Pause between consecutive addresses
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub google_api_key: Option<String>,
    pub endpoints: EndpointConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EndpointConfig {
    pub nominatim: String,
    pub arcgis: String,
    pub google: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub sheet: Option<String>,
    /// Columns joined into the address; the first one must be filled
    pub address_columns: Vec<String>,
    pub required_columns: Vec<String>,
    pub suffix: Option<String>,
    pub separator: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub sheet_name: String,
    pub address_column: String,
    pub latitude_column: String,
    pub longitude_column: String,
    /// Written in both coordinate cells when an address is not found
    pub not_found_label: String,
    pub address_width: f64,
    pub coordinate_width: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// `osm`, `google-hybrid` or a tile URL template
    pub tiles: String,
    pub attribution: Option<String>,
    pub zoom: u8,
    /// `[lat, lon]`; defaults to the mean of the plotted points
    pub center: Option<[f64; 2]>,
    pub open: bool,
    pub marker_group: String,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

impl GeocodingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Key from the config file, falling back to `GOOGLE_API_KEY`
    pub fn google_api_key(&self) -> Option<String> {
        self.google_api_key
            .clone()
            .or_else(|| std::env::var(GOOGLE_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            providers: vec!["osm".to_string(), "arcgis".to_string()],
            attempts: 3,
            retry_delay_ms: 2000,
            request_delay_ms: 1000,
            timeout_secs: 10,
            user_agent: format!("geobatch/{} (batch address geocoder)", env!("CARGO_PKG_VERSION")),
            google_api_key: None,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            nominatim: NOMINATIM_ENDPOINT.to_string(),
            arcgis: ARCGIS_ENDPOINT.to_string(),
            google: GOOGLE_ENDPOINT.to_string(),
        }
    }
}

impl InputConfig {
    pub fn address_template(&self) -> AddressTemplate {
        AddressTemplate {
            columns: self.address_columns.clone(),
            required: self.required_columns.clone(),
            suffix: self.suffix.clone(),
            separator: self.separator.clone(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            address_columns: vec!["#0".to_string(), "Municipio".to_string(), "Estado".to_string()],
            required_columns: vec!["Municipio".to_string(), "Estado".to_string()],
            suffix: Some("Brazil".to_string()),
            separator: ", ".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Results".to_string(),
            address_column: "Address".to_string(),
            latitude_column: "Latitude".to_string(),
            longitude_column: "Longitude".to_string(),
            not_found_label: "Not found".to_string(),
            address_width: 60.0,
            coordinate_width: 18.0,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tiles: "google-hybrid".to_string(),
            attribution: None,
            zoom: 12,
            center: None,
            open: false,
            marker_group: "Geocoded addresses".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.geocoding.providers, vec!["osm", "arcgis"]);
        assert_eq!(config.geocoding.attempts, 3);
        assert_eq!(config.output.not_found_label, "Not found");
        assert_eq!(config.input.suffix.as_deref(), Some("Brazil"));
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [geocoding]
            providers = ["arcgis", "google"]
            attempts = 5
            google_api_key = "abc"

            [geocoding.endpoints]
            arcgis = "http://localhost:8080/arcgis"

            [input]
            address_columns = ["Rua", "Bairro", "Municipio", "Estado"]
            suffix = "Brasil"

            [output]
            not_found_label = "Não encontrado"
            "#,
        )
        .unwrap();

        assert_eq!(config.geocoding.retry_policy().attempts, 5);
        assert_eq!(config.geocoding.google_api_key().as_deref(), Some("abc"));
        assert_eq!(config.geocoding.endpoints.arcgis, "http://localhost:8080/arcgis");
        assert_eq!(config.geocoding.endpoints.nominatim, NOMINATIM_ENDPOINT);
        assert_eq!(config.input.address_columns.len(), 4);
        assert_eq!(config.input.separator, ", ");
        assert_eq!(config.output.not_found_label, "Não encontrado");
        assert_eq!(config.output.latitude_column, "Latitude");
        assert_eq!(config.map.zoom, 12);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geobatch.toml");
        fs::write(&path, "[map]\ntiles = \"osm\"\nopen = true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.map.tiles, "osm");
        assert!(config.map.open);
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
