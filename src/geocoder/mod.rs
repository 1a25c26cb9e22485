//! Forward geocoding through third-party web services.
//!
//! Each provider turns a free-text address into the first matching
//! coordinate. [`ProviderChain`] walks an ordered list of providers with a
//! bounded retry budget and never fails: an exhausted chain yields
//! [`Resolution::NotFound`].

mod arcgis;
mod chain;
mod error;
mod google;
pub mod http;
mod nominatim;

use std::future::Future;
use std::str::FromStr;

use crate::config::GeocodingConfig;
use crate::models::LatLng;

pub use arcgis::{ArcGis, ARCGIS_ENDPOINT};
pub use chain::{ProviderChain, Resolution, RetryPolicy};
pub use error::GeocodeError;
pub use google::{Google, GOOGLE_ENDPOINT};
pub use nominatim::{Nominatim, NOMINATIM_ENDPOINT};

/// First candidate returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub location: LatLng,
    /// Provider's formatted address, when it returns one
    pub label: Option<String>,
}

/// A forward geocoding backend.
///
/// `Ok(None)` means the service answered but found no match.
pub trait Geocoder {
    fn name(&self) -> &str;

    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<GeocodeHit>, GeocodeError>> + Send;
}

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Nominatim,
    ArcGis,
    Google,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "osm" | "nominatim" => Ok(ProviderKind::Nominatim),
            "arcgis" | "esri" => Ok(ProviderKind::ArcGis),
            "google" => Ok(ProviderKind::Google),
            other => Err(format!(
                "unknown geocoding provider '{}' (expected osm, arcgis or google)",
                other
            )),
        }
    }
}

/// Concrete provider, dispatched statically
pub enum Provider {
    Nominatim(Nominatim),
    ArcGis(ArcGis),
    Google(Google),
}

impl Provider {
    /// Build a provider from configuration, sharing `client`
    pub fn from_config(kind: ProviderKind, config: &GeocodingConfig, client: reqwest::Client) -> Self {
        let endpoints = &config.endpoints;
        match kind {
            ProviderKind::Nominatim => {
                Provider::Nominatim(Nominatim::new(client, endpoints.nominatim.clone()))
            }
            ProviderKind::ArcGis => Provider::ArcGis(ArcGis::new(client, endpoints.arcgis.clone())),
            ProviderKind::Google => Provider::Google(Google::new(
                client,
                endpoints.google.clone(),
                config.google_api_key(),
            )),
        }
    }
}

impl Geocoder for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::Nominatim(p) => p.name(),
            Provider::ArcGis(p) => p.name(),
            Provider::Google(p) => p.name(),
        }
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        match self {
            Provider::Nominatim(p) => p.geocode(address).await,
            Provider::ArcGis(p) => p.geocode(address).await,
            Provider::Google(p) => p.geocode(address).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!("OSM".parse::<ProviderKind>(), Ok(ProviderKind::Nominatim));
        assert_eq!("nominatim".parse::<ProviderKind>(), Ok(ProviderKind::Nominatim));
        assert_eq!(" arcgis ".parse::<ProviderKind>(), Ok(ProviderKind::ArcGis));
        assert_eq!("Google".parse::<ProviderKind>(), Ok(ProviderKind::Google));
        assert!("bing".parse::<ProviderKind>().is_err());
    }
}
