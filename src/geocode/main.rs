//! Batch geocoder.
//!
//! Reads addresses from a spreadsheet, resolves them through the configured
//! provider chain, writes the coordinates back and plots the results.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geobatch::batch::{geocode_table, BatchOptions};
use geobatch::config::Config;
use geobatch::geocoder::ProviderChain;
use geobatch::map::{open_in_browser, LeafletMap, MarkerStyle};
use geobatch::spreadsheet::{read_table, write_table, WriteOptions};

#[derive(Parser, Debug)]
#[command(name = "geocode")]
#[command(about = "Geocode the addresses of a spreadsheet")]
struct Args {
    /// Spreadsheet to read (xlsx, xls, ods or csv)
    #[arg(short, long)]
    input: PathBuf,

    /// Output spreadsheet [default: <input>_geocoded.xlsx]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worksheet to read instead of the first one
    #[arg(long)]
    sheet: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Provider to try, in order (osm, arcgis, google); repeatable
    #[arg(short, long = "provider")]
    providers: Vec<String>,

    /// Calls per provider before falling back
    #[arg(long)]
    attempts: Option<u32>,

    /// Pause between addresses in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Address columns, names or #N positions; the first one is required per row
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Columns that must be present in the input
    #[arg(long, value_delimiter = ',')]
    require: Option<Vec<String>>,

    /// Text appended to every address, e.g. the country
    #[arg(long)]
    suffix: Option<String>,

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

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if !self.providers.is_empty() {
            config.geocoding.providers = self.providers.clone();
        }
        if let Some(attempts) = self.attempts {
            config.geocoding.attempts = attempts;
        }
        if let Some(delay) = self.delay_ms {
            config.geocoding.request_delay_ms = delay;
        }
        if let Some(columns) = &self.columns {
            config.input.address_columns = columns.clone();
        }
        if let Some(required) = &self.require {
            config.input.required_columns = required.clone();
        }
        if let Some(suffix) = &self.suffix {
            config.input.suffix = (!suffix.trim().is_empty()).then(|| suffix.clone());
        }
        if self.sheet.is_some() {
            config.input.sheet = self.sheet.clone();
        }
        if let Some(tiles) = &self.tiles {
            config.map.tiles = tiles.clone();
        }
        if self.open {
            config.map.open = true;
        }
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("addresses");
    input.with_file_name(format!("{}_geocoded.xlsx", stem))
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
    args.apply(&mut config);

    if !args.input.exists() {
        bail!("Input file not found: {}", args.input.display());
    }
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input));

    info!("Geobatch geocoder");
    info!("Input: {}", args.input.display());

    let mut table = read_table(&args.input, config.input.sheet.as_deref())?;
    info!("Read {} row(s), {} column(s)", table.len(), table.headers.len());

    let template = config.input.address_template();
    // fail on missing columns before building any client
    template.resolve(&table)?;

    let chain = ProviderChain::from_config(&config.geocoding)?;
    let options = BatchOptions::from_config(&config.output, &config.geocoding);
    let report = geocode_table(&mut table, &template, &chain, &options).await?;

    let out = &config.output;
    let write_options = WriteOptions::new(&out.sheet_name)
        .with_width(&out.address_column, out.address_width)
        .with_width(&out.latitude_column, out.coordinate_width)
        .with_width(&out.longitude_column, out.coordinate_width);
    write_table(&output, &table, &write_options)?;
    info!("Results saved to '{}'", output.display());

    if !args.no_map {
        if report.points.is_empty() {
            warn!("No points to plot, skipping the map");
        } else {
            let map_path = args.map.clone().unwrap_or_else(|| output.with_extension("html"));
            let map = LeafletMap::from_config("Geocoded addresses", &config.map)
                .group_name(&config.map.marker_group)
                .marker_style(MarkerStyle::Pin)
                .layer_control(true)
                .points(report.points);
            map.save(&map_path)?;

            if config.map.open {
                if let Err(e) = open_in_browser(&map_path) {
                    warn!("Could not open the browser ({}); open '{}' manually", e, map_path.display());
                }
            }
        }
    }

    println!(
        "Done: {} found, {} not found, {} skipped in {:.1}s",
        report.found,
        report.not_found,
        report.skipped,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
