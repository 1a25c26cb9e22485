//! Spatial index over the polygons of a boundary.

use geo::{BoundingRect, Contains, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use super::Boundary;
use crate::models::LatLng;

/// Wrapper for R-tree indexing of boundary polygons
pub struct IndexedPolygon {
    pub polygon: Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedPolygon {
    pub fn new(polygon: Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        Some(Self {
            polygon,
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        })
    }
}

/// R-tree over the merged polygons of a [`Boundary`]
pub struct BoundaryIndex {
    tree: RTree<IndexedPolygon>,
}

impl BoundaryIndex {
    pub fn build(boundary: &Boundary) -> Self {
        let indexed: Vec<IndexedPolygon> = boundary
            .area
            .0
            .iter()
            .cloned()
            .filter_map(IndexedPolygon::new)
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Spatial index built with {} polygon(s)", tree.size());

        Self { tree }
    }

    /// True when the point lies strictly inside the area.
    ///
    /// Points on the outline are outside.
    pub fn contains(&self, location: LatLng) -> bool {
        let point = location.to_point();
        let query_envelope = AABB::from_point([location.lon, location.lat]);

        // Use R-tree to get candidates via envelope intersection, then filter with exact containment
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .any(|ip| ip.polygon.contains(&point))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
