//! Builder configuration
//!
//! Every field has a default, so a JSON config file only needs to name the
//! values it changes:
//!
//! ```json
//! { "cache_dir": "data/cache", "workers": 8, "cluster_params": { "radius": 75.0, "min_samples": 1 } }
//! ```

use crate::core_types::geo::GeoPoint;
use crate::features::clustering::ClusterParams;
use crate::features::trajectory::DEFAULT_SIMULATION_HOURS;
use crate::training::error::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// How the builder treats the on-disk record cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Return a cached table when present, otherwise build and store
    #[default]
    Use,
    /// Ignore any cached table, build, and overwrite it
    Rebuild,
    /// Never read or write the cache
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Location whose PSI is being forecast
    pub target: GeoPoint,
    /// Detections acquired in `[t - lookback, t)` feed the features at `t`
    pub fire_lookback_hours: u32,
    /// Wind is sliced over `[t, t + window)`
    pub weather_window_hours: u32,
    /// A grid point qualifies only with at least this many contiguous hours
    pub min_wind_hours: usize,
    /// Trajectory length, fixed regardless of the label horizon
    pub simulation_hours: usize,
    /// Largest accepted gap between a horizon and the PSI reading labelling it
    pub target_tolerance_hours: u32,
    pub cluster_params: ClusterParams,
    /// Worker threads; `None` uses every available core
    pub workers: Option<usize>,
    /// Processed timestamps between progress log lines
    pub progress_interval: usize,
    pub cache_dir: PathBuf,
    pub cache_policy: CachePolicy,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            target: GeoPoint::SINGAPORE,
            fire_lookback_hours: 72,
            weather_window_hours: 168,
            min_wind_hours: 24,
            simulation_hours: DEFAULT_SIMULATION_HOURS,
            target_tolerance_hours: 3,
            cluster_params: ClusterParams::default(),
            workers: None,
            progress_interval: 100,
            cache_dir: PathBuf::from("data/cache"),
            cache_policy: CachePolicy::Use,
        }
    }
}

impl BuilderConfig {
    /// Read a config from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }

    pub fn fire_lookback(&self) -> Duration {
        Duration::hours(i64::from(self.fire_lookback_hours))
    }

    pub fn weather_window(&self) -> Duration {
        Duration::hours(i64::from(self.weather_window_hours))
    }

    pub fn target_tolerance(&self) -> Duration {
        Duration::hours(i64::from(self.target_tolerance_hours))
    }
}
