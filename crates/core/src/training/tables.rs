//! Read-only historical tables shared by every builder worker
//!
//! [`HistoricalTables`] holds the full fire history, the gridded wind
//! history, and the PSI table. It is built once, wrapped in an `Arc`, and
//! never mutated afterwards. Loaded tables are kept in a process-global cache
//! so repeated runs over the same sources skip the CSV parse; call
//! [`clear_table_cache`] to release them.

use crate::core_types::fire::FireDetection;
use crate::core_types::geo::GeoPoint;
use crate::core_types::psi::PsiTable;
use crate::core_types::wind::{TimedWind, WindSample};
use crate::features::geospatial::distance;
use crate::training::error::Result;
use crate::training::sources::DataSources;
use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Hourly wind history at a fixed set of grid points
#[derive(Debug, Clone, Default)]
pub struct WeatherGrid {
    points: Vec<GeoPoint>,
    /// Per grid point, sorted by timestamp with unique timestamps
    series: Vec<Vec<TimedWind>>,
}

impl WeatherGrid {
    /// Group observations by exact grid coordinate. Grid points keep the
    /// order in which they first appear.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (GeoPoint, TimedWind)>,
    {
        let mut index: FxHashMap<(u64, u64), usize> = FxHashMap::default();
        let mut points = Vec::new();
        let mut series: Vec<Vec<TimedWind>> = Vec::new();

        for (point, obs) in observations {
            let key = (point.latitude.to_bits(), point.longitude.to_bits());
            let slot = *index.entry(key).or_insert_with(|| {
                points.push(point);
                series.push(Vec::new());
                points.len() - 1
            });
            series[slot].push(obs);
        }

        for s in &mut series {
            s.sort_by_key(|w| w.timestamp);
            s.dedup_by_key(|w| w.timestamp);
        }

        WeatherGrid { points, series }
    }

    pub fn grid_points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the grid point closest to `position`; the first of equally
    /// close points wins
    pub fn nearest_index(&self, position: GeoPoint) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let d = *distance(position, *p);
            let closer = match best {
                Some((_, best_d)) => d < best_d,
                None => !d.is_nan(),
            };
            if closer {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Observations at grid point `idx` within `[start, end)`
    pub fn window(&self, idx: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> &[TimedWind] {
        let Some(series) = self.series.get(idx) else {
            return &[];
        };
        let lo = series.partition_point(|w| w.timestamp < start);
        let hi = series.partition_point(|w| w.timestamp < end);
        &series[lo..hi.max(lo)]
    }

    /// Hourly samples at `start`, `start + 1h`, ... before `end`
    ///
    /// Position `k` of the result is the wind `k` hours after `start`. The
    /// sequence ends at the first missing hour.
    pub fn hourly_from(&self, idx: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<WindSample> {
        let mut expected = start;
        let mut run = Vec::new();
        for obs in self.window(idx, start, end) {
            if obs.timestamp != expected {
                break;
            }
            run.push(obs.sample);
            expected += Duration::hours(1);
        }
        run
    }

    /// Longest run of observations spaced exactly one hour apart in `[start, end)`
    pub fn longest_hourly_run(&self, idx: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        let mut longest = 0;
        let mut current = 0;
        let mut previous: Option<DateTime<Utc>> = None;
        for obs in self.window(idx, start, end) {
            current = match previous {
                Some(p) if obs.timestamp - p == Duration::hours(1) => current + 1,
                _ => 1,
            };
            longest = longest.max(current);
            previous = Some(obs.timestamp);
        }
        longest
    }
}

/// Fire, wind and PSI history for one set of data sources
#[derive(Debug, Clone, Default)]
pub struct HistoricalTables {
    /// Detections with a known acquisition time, ascending by that time
    fires: Vec<FireDetection>,
    /// Nearest weather grid point per entry of `fires`
    fire_grid: Vec<Option<usize>>,
    weather: WeatherGrid,
    psi: PsiTable,
}

impl HistoricalTables {
    /// Assemble the tables. Detections without an acquisition time cannot be
    /// placed in a lookback window and are left out.
    pub fn new(fires: Vec<FireDetection>, weather: WeatherGrid, psi: PsiTable) -> Self {
        let total = fires.len();
        let mut fires: Vec<FireDetection> = fires.into_iter().filter(|f| f.acquired_at.is_some()).collect();
        let undated = total - fires.len();
        if undated > 0 {
            tracing::debug!(undated, "dropping detections without acquisition time from history");
        }
        fires.sort_by_key(|f| f.acquired_at);

        let fire_grid = fires.iter().map(|f| weather.nearest_index(f.position)).collect();

        HistoricalTables {
            fires,
            fire_grid,
            weather,
            psi,
        }
    }

    /// Detections acquired in `[start, end)` with their nearest grid point
    pub fn fires_in(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> (&[FireDetection], &[Option<usize>]) {
        let lo = self.fires.partition_point(|f| f.acquired_at < Some(start));
        let hi = self.fires.partition_point(|f| f.acquired_at < Some(end));
        let hi = hi.max(lo);
        (&self.fires[lo..hi], &self.fire_grid[lo..hi])
    }

    pub fn fire_count(&self) -> usize {
        self.fires.len()
    }

    pub fn weather(&self) -> &WeatherGrid {
        &self.weather
    }

    pub fn psi(&self) -> &PsiTable {
        &self.psi
    }
}

type TableCache = RwLock<FxHashMap<DataSources, Arc<HistoricalTables>>>;

fn table_cache() -> &'static TableCache {
    static CACHE: OnceLock<TableCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(FxHashMap::default()))
}

/// Load the tables for `sources`, reusing a previously loaded copy
pub fn load_cached(sources: &DataSources) -> Result<Arc<HistoricalTables>> {
    if let Some(tables) = table_cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(sources)
    {
        tracing::debug!(fires = %sources.fires.display(), "historical tables served from memory");
        return Ok(Arc::clone(tables));
    }

    let tables = Arc::new(sources.load()?);
    table_cache()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(sources.clone(), Arc::clone(&tables));
    Ok(tables)
}

/// Drop every cached table set. Tables still held by callers stay alive
/// until their last `Arc` is released.
pub fn clear_table_cache() {
    let mut cache = table_cache().write().unwrap_or_else(PoisonError::into_inner);
    let dropped = cache.len();
    cache.clear();
    tracing::info!(dropped, "cleared historical table cache");
}
