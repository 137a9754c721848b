use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use swotpipe::pipeline::{self, trailing_window};
use swotpipe::{
    BoundingBox, CatalogClient, Downloader, Pipeline, PolygonReader, RunContext, SearchParams,
    UtmZone,
};

/// SWOT water-surface-elevation ingestion pipeline
#[derive(Debug, Parser)]
#[command(name = "swotpipe", version, about)]
struct Args {
    /// Data root holding Downloaded_Data/, Filtered_Data/ and Logs/
    #[arg(long, env = "SWOTPIPE_DATA_ROOT")]
    data_root: PathBuf,

    /// Vector file with the clip boundary (GeoJSON, Shapefile, ...)
    #[arg(long, env = "SWOTPIPE_POLYGON")]
    polygon: PathBuf,

    /// Length of the trailing discovery window in days
    #[arg(long, default_value_t = 18)]
    days: i64,

    /// Canonical UTM zone (northern hemisphere) for all outputs
    #[arg(long, default_value_t = 45)]
    zone: u8,

    /// Collection short name in the CMR catalog
    #[arg(long, default_value = "SWOT_L2_HR_Raster_2.0")]
    short_name: String,

    /// Wildcard granule-name filter
    #[arg(long, default_value = "*100m*PIC*_01")]
    granule_pattern: String,

    /// Substring a data URL must contain to be downloaded
    #[arg(long, default_value = "SWOT_L2_HR_Raster_100m")]
    url_substring: String,

    /// Search bounding box, lon/lat degrees
    #[arg(long, default_value_t = 89.7)]
    min_lon: f64,
    #[arg(long, default_value_t = 17.0)]
    min_lat: f64,
    #[arg(long, default_value_t = 94.9)]
    max_lon: f64,
    #[arg(long, default_value_t = 25.75)]
    max_lat: f64,

    /// Earthdata bearer token for granule downloads
    #[arg(long, env = "EARTHDATA_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

/// Send log output to an append-only per-run file under Logs/
fn init_logging(args: &Args) -> anyhow::Result<PathBuf> {
    let log_dir = args.data_root.join(pipeline::LOG_DIR);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let log_path = log_dir.join(format!(
        "log_{}.log",
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    ));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    Ok(log_path)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_path = init_logging(&args)?;
    eprintln!("Logging to {}", log_path.display());

    log::info!("Starting the data download and processing script.");

    let result = run(&args);
    match &result {
        Ok(()) => log::info!("Script finished successfully."),
        Err(e) => log::error!("An error occurred: {:#}", e),
    }
    result
}

fn run(args: &Args) -> anyhow::Result<()> {
    let canonical = UtmZone::north(args.zone);

    let polygon = PolygonReader::load(&args.polygon, canonical)
        .with_context(|| format!("loading reference polygon {}", args.polygon.display()))?;

    let ctx = RunContext::new(&args.data_root, canonical, polygon)
        .with_context(|| format!("preparing run directories in {}", args.data_root.display()))?;

    let catalog = CatalogClient::new().context("creating catalog client")?;
    let downloader = Downloader::new(args.token.clone()).context("creating downloader")?;

    let (start, end) = trailing_window(args.days);
    let params = SearchParams {
        short_name: args.short_name.clone(),
        bounding_box: BoundingBox {
            min_lon: args.min_lon,
            min_lat: args.min_lat,
            max_lon: args.max_lon,
            max_lat: args.max_lat,
        },
        granule_pattern: args.granule_pattern.clone(),
        start,
        end,
        url_substring: args.url_substring.clone(),
    };

    let pipeline = Pipeline::new(ctx, catalog, downloader);
    pipeline.run(&params).context("pipeline run failed")?;
    Ok(())
}
