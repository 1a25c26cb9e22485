//! Standalone HTML maps (Leaflet) with markers and an optional boundary overlay.

mod browser;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::MapConfig;
use crate::models::LatLng;

pub use browser::open_in_browser;

const LEAFLET_VERSION: &str = "1.9.4";

const OSM_TILES: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";
const GOOGLE_HYBRID_TILES: &str = "https://mt1.google.com/vt/lyrs=y&x={x}&y={y}&z={z}";
const GOOGLE_ATTRIBUTION: &str = "&copy; Google";

/// Base layer
#[derive(Debug, Clone, PartialEq)]
pub enum TileLayer {
    OpenStreetMap,
    /// Satellite imagery with labels
    GoogleHybrid,
    Custom { url: String, attribution: String },
}

impl TileLayer {
    /// `osm`, `google-hybrid`, or a tile URL template
    pub fn parse(spec: &str, attribution: Option<&str>) -> Self {
        match spec.trim().to_lowercase().as_str() {
            "osm" | "openstreetmap" => TileLayer::OpenStreetMap,
            "google" | "google-hybrid" | "hybrid" | "satellite" => TileLayer::GoogleHybrid,
            _ => TileLayer::Custom {
                url: spec.trim().to_string(),
                attribution: attribution.unwrap_or_default().to_string(),
            },
        }
    }

    fn url(&self) -> &str {
        match self {
            TileLayer::OpenStreetMap => OSM_TILES,
            TileLayer::GoogleHybrid => GOOGLE_HYBRID_TILES,
            TileLayer::Custom { url, .. } => url,
        }
    }

    fn attribution(&self) -> &str {
        match self {
            TileLayer::OpenStreetMap => OSM_ATTRIBUTION,
            TileLayer::GoogleHybrid => GOOGLE_ATTRIBUTION,
            TileLayer::Custom { attribution, .. } => attribution,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerStyle {
    Pin,
    Circle { radius: f64, color: String },
}

/// A marker; popup and tooltip lines are plain text
#[derive(Debug, Clone, PartialEq)]
pub struct MapPoint {
    pub location: LatLng,
    pub popup: Option<String>,
    pub tooltip: Vec<String>,
}

impl MapPoint {
    pub fn new(location: LatLng) -> Self {
        Self {
            location,
            popup: None,
            tooltip: Vec::new(),
        }
    }

    pub fn with_popup(mut self, text: impl Into<String>) -> Self {
        self.popup = Some(text.into());
        self
    }

    pub fn with_tooltip_line(mut self, line: impl Into<String>) -> Self {
        self.tooltip.push(line.into());
        self
    }
}

/// GeoJSON drawn under the markers
#[derive(Debug, Clone)]
pub struct Overlay {
    pub name: String,
    pub geojson: String,
    pub color: String,
    pub fill_color: String,
    pub weight: f64,
    pub fill_opacity: f64,
}

impl Overlay {
    pub fn new(name: impl Into<String>, geojson: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geojson: geojson.into(),
            color: "black".to_string(),
            fill_color: "#0000ff".to_string(),
            weight: 2.0,
            fill_opacity: 0.1,
        }
    }
}

#[derive(Serialize)]
struct MarkerData {
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    popup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tooltip: Option<String>,
}

pub struct LeafletMap {
    title: String,
    tiles: TileLayer,
    zoom: u8,
    center: Option<LatLng>,
    group_name: String,
    style: MarkerStyle,
    points: Vec<MapPoint>,
    overlay: Option<Overlay>,
    fit_bounds: bool,
    layer_control: bool,
}

impl LeafletMap {
    pub fn new(title: impl Into<String>, tiles: TileLayer) -> Self {
        Self {
            title: title.into(),
            tiles,
            zoom: 12,
            center: None,
            group_name: "Markers".to_string(),
            style: MarkerStyle::Pin,
            points: Vec::new(),
            overlay: None,
            fit_bounds: true,
            layer_control: false,
        }
    }

    /// Tiles, zoom and center taken from the `[map]` settings
    pub fn from_config(title: impl Into<String>, config: &MapConfig) -> Self {
        let tiles = TileLayer::parse(&config.tiles, config.attribution.as_deref());
        Self::new(title, tiles)
            .zoom(config.zoom)
            .center(config.center.map(|[lat, lon]| LatLng::new(lat, lon)))
    }

    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn center(mut self, center: Option<LatLng>) -> Self {
        self.center = center;
        self
    }

    pub fn group_name(mut self, name: impl Into<String>) -> Self {
        self.group_name = name.into();
        self
    }

    pub fn marker_style(mut self, style: MarkerStyle) -> Self {
        self.style = style;
        self
    }

    pub fn points(mut self, points: Vec<MapPoint>) -> Self {
        self.points = points;
        self
    }

    pub fn overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn fit_bounds(mut self, fit: bool) -> Self {
        self.fit_bounds = fit;
        self
    }

    pub fn layer_control(mut self, enabled: bool) -> Self {
        self.layer_control = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Explicit center, else the mean of the points, else (0, 0)
    pub fn resolved_center(&self) -> LatLng {
        if let Some(c) = self.center {
            return c;
        }
        if self.points.is_empty() {
            return LatLng::new(0.0, 0.0);
        }
        let n = self.points.len() as f64;
        let (lat, lon) = self.points.iter().fold((0.0, 0.0), |(lat, lon), p| {
            (lat + p.location.lat, lon + p.location.lon)
        });
        LatLng::new(lat / n, lon / n)
    }

    fn marker_data(&self) -> Vec<MarkerData> {
        self.points
            .iter()
            .map(|p| MarkerData {
                lat: p.location.lat,
                lon: p.location.lon,
                popup: p.popup.as_ref().map(|t| format!("<b>{}</b>", html_escape(t))),
                tooltip: (!p.tooltip.is_empty()).then(|| {
                    p.tooltip
                        .iter()
                        .map(|l| html_escape(l))
                        .collect::<Vec<_>>()
                        .join("<br>")
                }),
            })
            .collect()
    }

    fn marker_js(&self) -> String {
        match &self.style {
            MarkerStyle::Pin => "L.marker([p.lat, p.lon])".to_string(),
            MarkerStyle::Circle { radius, color } => {
                let color = js_value(color);
                format!(
                    "L.circleMarker([p.lat, p.lon], {{radius: {}, color: {}, fill: true, fillColor: {}, fillOpacity: 0.7}})",
                    radius, color, color
                )
            }
        }
    }

    fn overlay_js(&self) -> String {
        let Some(overlay) = &self.overlay else {
            return String::new();
        };
        format!(
            r#"
        var boundary = L.geoJSON({}, {{
            style: function () {{
                return {{color: {}, fillColor: {}, weight: {}, fillOpacity: {}}};
            }}
        }}).addTo(map);
        overlays[{}] = boundary;
        if (!fitMarkers) {{ map.fitBounds(boundary.getBounds()); }}"#,
            script_safe(&overlay.geojson),
            js_value(&overlay.color),
            js_value(&overlay.fill_color),
            overlay.weight,
            overlay.fill_opacity,
            js_value(&overlay.name),
        )
    }

    /// Render a standalone HTML page
    pub fn render(&self) -> String {
        let center = self.resolved_center();
        let markers = script_safe(
            &serde_json::to_string(&self.marker_data()).unwrap_or_else(|_| "[]".to_string()),
        );
        let fit_markers = self.fit_bounds && !self.points.is_empty();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="generator" content="geobatch {version} {generated}">
    <title>{title}</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@{leaflet}/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@{leaflet}/dist/leaflet.js"></script>
    <style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
    <div id="map"></div>
    <script>
        var map = L.map('map').setView([{lat}, {lon}], {zoom});
        L.tileLayer({tiles}, {{maxZoom: 20, attribution: {attribution}}}).addTo(map);
        var overlays = {{}};
        var fitMarkers = {fit_markers};
{overlay}
        var points = {markers};
        var markers = L.featureGroup();
        points.forEach(function (p) {{
            var m = {marker};
            if (p.popup) {{ m.bindPopup(p.popup); }}
            if (p.tooltip) {{ m.bindTooltip(p.tooltip); }}
            m.addTo(markers);
        }});
        markers.addTo(map);
        overlays[{group}] = markers;
        if (fitMarkers) {{ map.fitBounds(markers.getBounds()); }}
        if ({layer_control}) {{ L.control.layers(null, overlays).addTo(map); }}
    </script>
</body>
</html>
"#,
            version = env!("CARGO_PKG_VERSION"),
            generated = Utc::now().to_rfc3339(),
            title = html_escape(&self.title),
            leaflet = LEAFLET_VERSION,
            lat = center.lat,
            lon = center.lon,
            zoom = self.zoom,
            tiles = js_value(self.tiles.url()),
            attribution = js_value(self.tiles.attribution()),
            fit_markers = fit_markers,
            overlay = self.overlay_js(),
            markers = markers,
            marker = self.marker_js(),
            group = js_value(&self.group_name),
            layer_control = self.layer_control,
        )
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Creating map with {} marker(s) in '{}'...", self.points.len(), path.display());
        fs::write(path, self.render())
            .with_context(|| format!("Failed to write map: {}", path.display()))?;
        Ok(())
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// JSON string literal, usable as a JavaScript expression inside <script>
fn js_value(s: &str) -> String {
    script_safe(&serde_json::Value::String(s.to_string()).to_string())
}

/// Keep embedded JSON from closing the surrounding script element
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}
