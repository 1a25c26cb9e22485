//! Boundary check for coordinates already in a spreadsheet.
//!
//! Flags each row as inside or outside a GeoJSON area, keeps the rows inside,
//! plots them over the area and can re-geocode rows that fell outside.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geobatch::batch::{recheck_outside, BatchOptions, LATITUDE_NEW, LONGITUDE_NEW};
use geobatch::config::Config;
use geobatch::geocoder::ProviderChain;
use geobatch::map::{open_in_browser, LeafletMap, MapPoint, MarkerStyle, Overlay};
use geobatch::models::{extract_points, Table};
use geobatch::pip::{AreaFilter, AreaReport, Boundary};
use geobatch::spreadsheet::{read_table, write_table, WriteOptions};

#[derive(Parser, Debug)]
#[command(name = "boundary")]
#[command(about = "Check spreadsheet coordinates against a GeoJSON boundary")]
struct Args {
    /// Spreadsheet with coordinates
    #[arg(short, long)]
    input: PathBuf,

    /// GeoJSON file with the area's polygons
    #[arg(short, long)]
    boundary: PathBuf,

    /// Output spreadsheet [default: <input>_in_area.xlsx]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worksheet to read instead of the first one
    #[arg(long)]
    sheet: Option<String>,

    /// TOML configuration file, used for geocoding and map settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Latitude column, name or #N position
    #[arg(long, default_value = "#8")]
    lat_column: String,

    /// Longitude column, name or #N position
    #[arg(long, default_value = "#9")]
    lon_column: String,

    /// Identifier shown in the marker tooltip
    #[arg(long, default_value = "#0")]
    id_column: String,

    /// Label shown in the marker tooltip
    #[arg(long, default_value = "#3")]
    label_column: String,

    /// Column receiving the inside/outside flag
    #[arg(long, default_value = "Inside_Area")]
    flag_column: String,

    /// Keep rows outside the area (and without coordinates) in the output
    #[arg(long)]
    keep_outside: bool,

    /// HTML map to write [default: <output>.html]
    #[arg(long)]
    map: Option<PathBuf>,

    /// Skip the map
    #[arg(long)]
    no_map: bool,

    /// Open the map in the browser when done
    #[arg(long)]
    open: bool,

    /// Map tiles: osm, google-hybrid or a tile URL template
    #[arg(long)]
    tiles: Option<String>,

    /// Re-geocode the first N rows found outside the area
    #[arg(long, value_name = "N")]
    recheck_outside: Option<usize>,

    /// Address column used when re-geocoding
    #[arg(long, default_value = "ENDERECO")]
    address_column: String,

    /// Spreadsheet for re-geocoded rows [default: <input>_recheck.xlsx]
    #[arg(long)]
    recheck_output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

struct Columns {
    lat: usize,
    lon: usize,
    id: usize,
    label: usize,
}

impl Columns {
    fn resolve(args: &Args, table: &Table) -> Result<Self> {
        let specs = [
            &args.lat_column,
            &args.lon_column,
            &args.id_column,
            &args.label_column,
        ];
        let resolved: Vec<Option<usize>> = specs.iter().map(|s| table.resolve_column(s)).collect();
        let missing: Vec<&str> = specs
            .iter()
            .zip(&resolved)
            .filter(|(_, col)| col.is_none())
            .map(|(spec, _)| spec.as_str())
            .collect();
        if !missing.is_empty() {
            bail!(
                "The following columns were not found in the input: {}",
                missing.join(", ")
            );
        }
        let col = |i: usize| resolved[i].unwrap_or_default();
        Ok(Self {
            lat: col(0),
            lon: col(1),
            id: col(2),
            label: col(3),
        })
    }
}

fn sibling(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("points");
    input.with_file_name(format!("{}_{}.xlsx", stem, suffix))
}

/// Markers for the rows inside the area
fn inside_points(table: &Table, columns: &Columns, report: &AreaReport) -> Vec<MapPoint> {
    let (points, _) = extract_points(table, columns.lat, columns.lon);
    let id_header = &table.headers[columns.id];
    let label_header = &table.headers[columns.label];

    points
        .into_iter()
        .filter(|(row, _)| report.inside_rows.binary_search(row).is_ok())
        .map(|(row, location)| {
            MapPoint::new(location)
                .with_tooltip_line(format!("{}: {}", id_header, table.cell(row, columns.id)))
                .with_tooltip_line(format!("{}: {}", label_header, table.cell(row, columns.label)))
        })
        .collect()
}

/// Re-geocode the first `limit` outside rows and save them with their new points
async fn recheck(
    table: &Table,
    report: &AreaReport,
    filter: &AreaFilter,
    config: &Config,
    args: &Args,
    limit: usize,
) -> Result<()> {
    if report.outside_rows.is_empty() {
        info!("No rows outside the area to re-check");
        return Ok(());
    }

    let chain = ProviderChain::from_config(&config.geocoding)?;
    let options = BatchOptions::from_config(&config.output, &config.geocoding);
    let recheck = recheck_outside(table, report, limit, &args.address_column, filter, &chain, &options).await?;

    let path = args
        .recheck_output
        .clone()
        .unwrap_or_else(|| sibling(&args.input, "recheck"));
    write_table(
        &path,
        &recheck.table,
        &WriteOptions::new("Recheck")
            .with_width(LATITUDE_NEW, config.output.coordinate_width)
            .with_width(LONGITUDE_NEW, config.output.coordinate_width),
    )?;
    info!("Re-checked rows saved to '{}'", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let start = Instant::now();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(tiles) = &args.tiles {
        config.map.tiles = tiles.clone();
    }
    let sheet = args.sheet.as_deref().or(config.input.sheet.as_deref());

    info!("Geobatch boundary check");
    let mut table = read_table(&args.input, sheet)?;
    let columns = Columns::resolve(&args, &table)?;

    let boundary = Boundary::load(&args.boundary)?;
    let filter = AreaFilter::new(&boundary);
    let report = filter.tag_table(&mut table, columns.lat, columns.lon, &args.flag_column);

    if !args.no_map {
        let points = inside_points(&table, &columns, &report);
        if points.is_empty() {
            warn!("No points to plot, skipping the map");
        } else {
            let output = args.output.clone().unwrap_or_else(|| sibling(&args.input, "in_area"));
            let map_path = args.map.clone().unwrap_or_else(|| output.with_extension("html"));
            LeafletMap::from_config(format!("Points inside {}", boundary.name), &config.map)
                .overlay(Overlay::new(&boundary.name, boundary.source.clone()))
                .group_name("Points inside the area")
                .marker_style(MarkerStyle::Circle {
                    radius: 5.0,
                    color: "green".to_string(),
                })
                .layer_control(true)
                .points(points)
                .save(&map_path)?;

            if args.open || config.map.open {
                if let Err(e) = open_in_browser(&map_path) {
                    warn!("Could not open the browser ({}); open '{}' manually", e, map_path.display());
                }
            }
        }
    }

    if let Some(limit) = args.recheck_outside {
        recheck(&table, &report, &filter, &config, &args, limit).await?;
    }

    let output = args.output.clone().unwrap_or_else(|| sibling(&args.input, "in_area"));
    let kept = if args.keep_outside {
        table
    } else {
        table.select_rows(&report.inside_rows)
    };
    write_table(
        &output,
        &kept,
        &WriteOptions::new(&config.output.sheet_name).with_width(&args.flag_column, 14.0),
    )?;
    info!("{} row(s) saved to '{}'", kept.len(), output.display());

    println!(
        "Done: {} inside, {} outside, {} without coordinates in {:.1}s",
        report.inside_rows.len(),
        report.outside_rows.len(),
        report.invalid_rows.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
