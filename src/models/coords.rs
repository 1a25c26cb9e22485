//! Coordinate types and parsing of coordinates stored in spreadsheets.

use serde::{Deserialize, Serialize};

use super::{CellValue, Table};

/// WGS84 latitude/longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a coordinate, rejecting non-finite or out of range values
    pub fn new_checked(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// geo point (x = longitude, y = latitude)
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// Parse a latitude or longitude cell.
///
/// Accepts numeric cells and text using either `.` or `,` as decimal
/// separator. Blank, `nan` and unparsable text yield `None`.
pub fn parse_coordinate(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => {
            let normalized = s.trim().replace(',', ".");
            if normalized.is_empty() {
                return None;
            }
            normalized.parse::<f64>().ok()?
        }
        CellValue::Empty | CellValue::Bool(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// Rows whose coordinate columns hold a valid location.
///
/// Returns `(row_index, location)` pairs plus the number of rows dropped
/// because a coordinate was missing or invalid.
pub fn extract_points(table: &Table, lat_col: usize, lon_col: usize) -> (Vec<(usize, LatLng)>, usize) {
    let mut points = Vec::with_capacity(table.len());
    let mut dropped = 0;

    for row in 0..table.len() {
        let lat = parse_coordinate(table.cell(row, lat_col));
        let lon = parse_coordinate(table.cell(row, lon_col));
        match (lat, lon) {
            (Some(lat), Some(lon)) => match LatLng::new_checked(lat, lon) {
                Some(p) => points.push((row, p)),
                None => dropped += 1,
            },
            _ => dropped += 1,
        }
    }

    (points, dropped)
}
