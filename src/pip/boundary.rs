//! Boundary areas loaded from GeoJSON.

use anyhow::{bail, Context, Result};
use geo::{BooleanOps, BoundingRect, MultiPolygon, Polygon, Rect};
use geo_types::Geometry;
use geojson::{Feature, GeoJson};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// A boundary area: the union of every polygon in a GeoJSON document
#[derive(Debug, Clone)]
pub struct Boundary {
    pub name: String,
    pub area: MultiPolygon<f64>,
    /// Normalized GeoJSON text, for drawing the outline on a map
    pub source: String,
}

impl Boundary {
    /// Load a boundary file; the name defaults to the file stem
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Reading boundary from '{}'...", path.display());

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read boundary file: {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("boundary");

        Self::from_geojson_str(name, &text)
            .with_context(|| format!("Invalid boundary file: {}", path.display()))
    }

    /// Parse a FeatureCollection, a Feature or a bare Geometry.
    ///
    /// A `name` property on the first feature overrides `default_name`.
    pub fn from_geojson_str(default_name: &str, text: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse().context("Failed to parse GeoJSON")?;

        let mut polygons = Vec::new();
        let mut name = None;

        match &geojson {
            GeoJson::FeatureCollection(fc) => {
                for feature in &fc.features {
                    name = name.or_else(|| feature_name(feature));
                    collect_feature(feature, &mut polygons)?;
                }
            }
            GeoJson::Feature(feature) => {
                name = feature_name(feature);
                collect_feature(feature, &mut polygons)?;
            }
            GeoJson::Geometry(geometry) => {
                collect_geometry(geometry.clone().try_into()?, &mut polygons);
            }
        }

        if polygons.is_empty() {
            bail!("GeoJSON contains no polygons");
        }

        let count = polygons.len();
        let area = union_all(polygons);
        let name = name.unwrap_or_else(|| default_name.to_string());

        info!(
            "Boundary '{}': {} polygon(s) merged into {}",
            name,
            count,
            area.0.len()
        );

        Ok(Self {
            name,
            area,
            source: geojson.to_string(),
        })
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.area.bounding_rect()
    }
}

fn feature_name(feature: &Feature) -> Option<String> {
    feature
        .property("name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn collect_feature(feature: &Feature, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    if let Some(geometry) = &feature.geometry {
        collect_geometry(geometry.clone().try_into()?, out);
    }
    Ok(())
}

fn collect_geometry(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_geometry(g, out);
            }
        }
        _ => debug!("Ignoring non-polygon geometry"),
    }
}

/// Merge polygons so that shared edges between neighbours disappear
fn union_all(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut iter = polygons.into_iter();
    let mut merged = match iter.next() {
        Some(first) => MultiPolygon::new(vec![first]),
        None => return MultiPolygon::new(vec![]),
    };
    for polygon in iter {
        merged = merged.union(&MultiPolygon::new(vec![polygon]));
    }
    merged
}
