//! Core data models shared by the geocoding and boundary pipelines.

pub mod coords;
pub mod table;

pub use coords::{extract_points, parse_coordinate, LatLng};
pub use table::{CellValue, Table};
