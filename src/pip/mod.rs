//! Point-in-Polygon (PIP) checks against a boundary area.
//!
//! A boundary is read from GeoJSON, its polygons merged into one area, and
//! indexed with an R-tree for containment lookups.

mod boundary;
mod index;
mod service;

pub use boundary::Boundary;
pub use index::BoundaryIndex;
pub use service::{AreaFilter, AreaReport};
