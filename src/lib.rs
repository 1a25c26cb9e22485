//! Geobatch - batch geocoding of spreadsheet addresses
//!
//! This library provides shared types and modules for the geocode and boundary binaries.

pub mod address;
pub mod batch;
pub mod config;
pub mod geocoder;
pub mod map;
pub mod models;
pub mod pip;
pub mod spreadsheet;

pub use config::Config;
pub use geocoder::{ProviderChain, Resolution};
pub use models::{CellValue, LatLng, Table};
