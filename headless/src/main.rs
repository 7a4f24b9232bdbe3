use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use haze_core::training::sources::{parse_timestamp, read_fires, read_weather};
use haze_core::training::{
    BuildRequest, BuilderConfig, CachePolicy, DataSources, Horizon, RecordCache, TrainingBuilder, WindSpeedUnit,
};
use haze_core::{compute_features, FeatureInputs, GeoPoint, GridWindForecast};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Haze forecasting feature and training-data tool
#[derive(Parser, Debug)]
#[command(name = "haze-headless")]
#[command(about = "Singapore PSI haze feature engineering", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build (or load from cache) the training table for a date range
    Prepare {
        /// Directory holding fires.csv, weather.csv and psi.csv
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// First date to sample (YYYY-MM-DD)
        #[arg(short, long)]
        start: NaiveDate,

        /// Last date to sample, inclusive (YYYY-MM-DD)
        #[arg(short, long)]
        end: NaiveDate,

        /// Minimum hours between sampled timestamps
        #[arg(short, long, default_value_t = 24)]
        interval: u32,

        /// JSON builder config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Ignore any cached table and rebuild it
        #[arg(long, conflicts_with = "no_cache")]
        rebuild: bool,

        /// Neither read nor write the cache
        #[arg(long)]
        no_cache: bool,

        /// Worker threads (default: all cores)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Wind speed unit in weather.csv (kmh or mps)
        #[arg(long, default_value = "kmh")]
        wind_unit: WindSpeedUnit,

        /// Also write the single-horizon view (24h, 48h, 72h or 7d) as JSON lines
        #[arg(long, requires = "output")]
        horizon: Option<Horizon>,

        /// Output file for --horizon
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute a live feature vector
    Features {
        /// FIRMS hotspot CSV for the lookback window
        #[arg(long)]
        fires: PathBuf,

        /// Gridded hourly wind CSV starting at the reference time
        #[arg(long)]
        wind: PathBuf,

        /// Current PSI
        #[arg(long)]
        psi: f64,

        /// Reference time (RFC 3339 or YYYY-MM-DD HH:MM:SS, UTC)
        #[arg(short, long)]
        time: String,

        /// Wind speed unit in the wind CSV (kmh or mps)
        #[arg(long, default_value = "kmh")]
        wind_unit: WindSpeedUnit,

        /// Target latitude
        #[arg(long, default_value_t = GeoPoint::SINGAPORE.latitude)]
        lat: f64,

        /// Target longitude
        #[arg(long, default_value_t = GeoPoint::SINGAPORE.longitude)]
        lon: f64,

        /// Wind simulation hours
        #[arg(long, default_value_t = haze_core::features::DEFAULT_SIMULATION_HOURS)]
        hours: usize,
    },

    /// Delete cached training tables
    ClearCache {
        /// Cache directory
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Prepare {
            data_dir,
            start,
            end,
            interval,
            config,
            cache_dir,
            rebuild,
            no_cache,
            workers,
            wind_unit,
            horizon,
            output,
        } => {
            let mut cfg = match &config {
                Some(path) => BuilderConfig::load(path).with_context(|| format!("reading config {}", path.display()))?,
                None => BuilderConfig::default(),
            };
            if let Some(dir) = cache_dir {
                cfg.cache_dir = dir;
            }
            if workers.is_some() {
                cfg.workers = workers;
            }
            if rebuild {
                cfg.cache_policy = CachePolicy::Rebuild;
            } else if no_cache {
                cfg.cache_policy = CachePolicy::Disabled;
            }

            let request = BuildRequest::new(start, end, interval)?;
            let sources = DataSources::from_dir(&data_dir).with_wind_unit(wind_unit);
            let tables = haze_core::training::load_cached(&sources)
                .with_context(|| format!("loading historical data from {}", data_dir.display()))?;

            let cancel = Arc::new(AtomicBool::new(false));
            let handler_flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || {
                tracing::warn!("interrupt received, finishing in-flight timestamps");
                handler_flag.store(true, Ordering::Relaxed);
            })
            .context("installing Ctrl-C handler")?;

            let builder = TrainingBuilder::new(cfg, tables).with_cancel_flag(cancel);
            let (table, report) = builder.build(&request)?;
            println!("{report}");

            if let (Some(h), Some(path)) = (horizon, output) {
                let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                let mut written = 0usize;
                for sample in table.for_horizon(h) {
                    serde_json::to_writer(&mut writer, &sample)?;
                    writer.write_all(b"\n")?;
                    written += 1;
                }
                writer.flush()?;
                println!("wrote {written} {h} samples to {}", path.display());
            }
        }

        Command::Features {
            fires,
            wind,
            psi,
            time,
            wind_unit,
            lat,
            lon,
            hours,
        } => {
            let Some(reference) = parse_timestamp(&time) else {
                bail!("unrecognised reference time '{time}'");
            };

            let detections = read_fires(File::open(&fires).with_context(|| format!("opening {}", fires.display()))?)?;
            let grid = read_weather(File::open(&wind).with_context(|| format!("opening {}", wind.display()))?, wind_unit)?;
            let forecast = forecast_from(&grid, reference);
            if forecast.is_empty() {
                tracing::warn!(time = %reference, "no wind at or after the reference time, clusters stay in place");
            }

            let inputs = FeatureInputs {
                target: GeoPoint::new(lat, lon),
                simulation_hours: hours,
                ..FeatureInputs::new(&detections, &forecast, psi, reference)
            };
            let features = compute_features(&inputs);
            println!("{}", serde_json::to_string_pretty(&features)?);
        }

        Command::ClearCache { cache_dir } => {
            let removed = RecordCache::new(&cache_dir).clear()?;
            println!("removed {removed} cached tables from {}", cache_dir.display());
        }
    }

    Ok(())
}

/// Hourly wind from the reference time onwards at every grid point
fn forecast_from(grid: &haze_core::training::WeatherGrid, reference: DateTime<Utc>) -> GridWindForecast {
    let end = reference + Duration::days(7);
    grid.grid_points()
        .iter()
        .enumerate()
        .map(|(idx, point)| (*point, grid.hourly_from(idx, reference, end)))
        .filter(|(_, run)| !run.is_empty())
        .collect()
}
