//! Geocoding every row of a table.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::address::AddressTemplate;
use crate::config::{GeocodingConfig, OutputConfig};
use crate::geocoder::{Geocoder, ProviderChain, Resolution};
use crate::map::MapPoint;
use crate::models::{CellValue, Table};
use crate::pip::{AreaFilter, AreaReport};

pub const LATITUDE_NEW: &str = "Latitude_New";
pub const LONGITUDE_NEW: &str = "Longitude_New";
pub const INSIDE_NEW: &str = "Inside_Area_New";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pause between consecutive addresses
    pub request_delay: Duration,
    pub not_found_label: String,
    pub address_column: String,
    pub latitude_column: String,
    pub longitude_column: String,
    pub show_progress: bool,
}

impl BatchOptions {
    pub fn from_config(output: &OutputConfig, geocoding: &GeocodingConfig) -> Self {
        Self {
            request_delay: geocoding.request_delay(),
            not_found_label: output.not_found_label.clone(),
            address_column: output.address_column.clone(),
            latitude_column: output.latitude_column.clone(),
            longitude_column: output.longitude_column.clone(),
            show_progress: true,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default(), &GeocodingConfig::default())
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub found: usize,
    pub not_found: usize,
    /// Rows without an address
    pub skipped: usize,
    /// Provider calls across the whole batch
    pub requests: u64,
    pub elapsed: Duration,
    /// One marker per resolved row, labelled with its address
    pub points: Vec<MapPoint>,
}

fn progress_bar(len: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Resolve each address in turn, `None` entries are skipped without a request.
///
/// `request_delay` is observed between resolved addresses, not before the first.
pub async fn resolve_all<G: Geocoder>(
    chain: &ProviderChain<G>,
    addresses: &[Option<String>],
    options: &BatchOptions,
) -> Result<Vec<Option<Resolution>>> {
    let pb = progress_bar(addresses.len(), options.show_progress)?;
    let mut results = Vec::with_capacity(addresses.len());
    let mut first = true;

    for address in addresses {
        let resolution = match address {
            Some(address) => {
                if !first && !options.request_delay.is_zero() {
                    tokio::time::sleep(options.request_delay).await;
                }
                first = false;
                Some(chain.resolve(address).await)
            }
            None => None,
        };
        results.push(resolution);
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(results)
}

/// Geocode every row and append address, latitude and longitude columns.
///
/// Unresolved rows carry `not_found_label` in both coordinate columns; rows
/// with a blank primary address field are left empty.
pub async fn geocode_table<G: Geocoder>(
    table: &mut Table,
    template: &AddressTemplate,
    chain: &ProviderChain<G>,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let start = Instant::now();
    let resolved = template.resolve(table)?;

    let addresses: Vec<Option<String>> = (0..table.len())
        .map(|row| {
            let address = resolved.build(table, row);
            if address.is_none() {
                // header is sheet row 1
                warn!("Row {}: empty address, skipping", row + 2);
            }
            address
        })
        .collect();

    info!("Geocoding {} row(s)...", table.len());
    let resolutions = resolve_all(chain, &addresses, options).await?;

    let mut report = BatchReport::default();
    let mut address_cells = Vec::with_capacity(table.len());
    let mut lat_cells = Vec::with_capacity(table.len());
    let mut lon_cells = Vec::with_capacity(table.len());

    for (address, resolution) in addresses.into_iter().zip(resolutions) {
        let (lat, lon) = match &resolution {
            Some(r) => {
                report.requests += u64::from(r.attempts());
                match r.location() {
                    Some(loc) => {
                        report.found += 1;
                        report.points.push(
                            MapPoint::new(loc).with_popup(address.clone().unwrap_or_default()),
                        );
                        (CellValue::Number(loc.lat), CellValue::Number(loc.lon))
                    }
                    None => {
                        report.not_found += 1;
                        let label = CellValue::Text(options.not_found_label.clone());
                        (label.clone(), label)
                    }
                }
            }
            None => {
                report.skipped += 1;
                (CellValue::Empty, CellValue::Empty)
            }
        };
        address_cells.push(address.map(CellValue::Text).unwrap_or_default());
        lat_cells.push(lat);
        lon_cells.push(lon);
    }

    table.push_column(&options.address_column, address_cells);
    table.push_column(&options.latitude_column, lat_cells);
    table.push_column(&options.longitude_column, lon_cells);

    report.elapsed = start.elapsed();
    info!(
        "{} found, {} not found, {} skipped ({} request(s))",
        report.found, report.not_found, report.skipped, report.requests
    );
    Ok(report)
}

/// Outcome of re-geocoding rows that fell outside an area
#[derive(Debug)]
pub struct RecheckReport {
    /// The re-checked rows with new coordinate and containment columns
    pub table: Table,
    pub resolved: usize,
    /// Rows whose new point lies inside the area
    pub inside: usize,
}

/// Re-geocode the first `limit` rows outside the area and check the new
/// points again.
///
/// Rows that still cannot be resolved get empty new columns.
pub async fn recheck_outside<G: Geocoder>(
    table: &Table,
    report: &AreaReport,
    limit: usize,
    address_column: &str,
    filter: &AreaFilter,
    chain: &ProviderChain<G>,
    options: &BatchOptions,
) -> Result<RecheckReport> {
    let address_col = table
        .resolve_column(address_column)
        .with_context(|| format!("Address column '{}' not found", address_column))?;

    let rows: Vec<usize> = report.outside_rows.iter().copied().take(limit).collect();
    info!("Re-geocoding {} row(s) outside '{}'...", rows.len(), filter.name());

    let addresses: Vec<Option<String>> = rows
        .iter()
        .map(|&row| {
            let cell = table.cell(row, address_col);
            (!cell.is_blank()).then(|| cell.display().trim().to_string())
        })
        .collect();
    let resolutions = resolve_all(chain, &addresses, options).await?;

    let mut recheck = RecheckReport {
        table: table.select_rows(&rows),
        resolved: 0,
        inside: 0,
    };
    let mut lat_cells = Vec::with_capacity(rows.len());
    let mut lon_cells = Vec::with_capacity(rows.len());
    let mut inside_cells = Vec::with_capacity(rows.len());

    for resolution in &resolutions {
        match resolution.as_ref().and_then(Resolution::location) {
            Some(location) => {
                let inside = filter.contains(location);
                recheck.resolved += 1;
                if inside {
                    recheck.inside += 1;
                }
                lat_cells.push(CellValue::Number(location.lat));
                lon_cells.push(CellValue::Number(location.lon));
                inside_cells.push(CellValue::Bool(inside));
            }
            None => {
                lat_cells.push(CellValue::Empty);
                lon_cells.push(CellValue::Empty);
                inside_cells.push(CellValue::Empty);
            }
        }
    }

    recheck.table.push_column(LATITUDE_NEW, lat_cells);
    recheck.table.push_column(LONGITUDE_NEW, lon_cells);
    recheck.table.push_column(INSIDE_NEW, inside_cells);

    info!(
        "{} of {} re-geocoded row(s) now inside '{}'",
        recheck.inside,
        rows.len(),
        filter.name()
    );
    Ok(recheck)
}
