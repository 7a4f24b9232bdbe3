//! Parallel training-table builder
//!
//! Sampled timestamps are independent, so the run is a parallel map on a
//! dedicated rayon pool followed by a sequential tally, sort and cache write.
//! Each worker sees the shared tables only through a [`TimestampContext`]
//! holding shared references; nothing is mutated during the map.
//!
//! A panic inside one timestamp is caught at the timestamp boundary and
//! counted as a failure. Cancellation is cooperative: once the flag is set,
//! timestamps not yet started are skipped and the run returns
//! [`BuildError::Cancelled`].

use crate::features::{compute_features, FeatureInputs, GridWindForecast};
use crate::training::cache::RecordCache;
use crate::training::config::{BuilderConfig, CachePolicy};
use crate::training::error::{BuildError, ExhaustionCause, Result};
use crate::training::tables::HistoricalTables;
use crate::training::targets::complete_targets;
use crate::training::{Horizon, TrainingRecord, TrainingTable};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Date range and sampling interval of one build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildRequest {
    pub start_date: NaiveDate,
    /// Inclusive: timestamps on this date are sampled
    pub end_date: NaiveDate,
    pub sample_interval_hours: u32,
}

impl BuildRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, sample_interval_hours: u32) -> Result<Self> {
        if start_date > end_date {
            return Err(BuildError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }
        if sample_interval_hours == 0 {
            return Err(BuildError::InvalidSampleInterval);
        }
        Ok(BuildRequest {
            start_date,
            end_date,
            sample_interval_hours,
        })
    }

    /// `[start_date 00:00, end_date + 1 day 00:00)` in UTC
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_date.and_time(NaiveTime::MIN).and_utc();
        let end = self.end_date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1);
        (start, end)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::hours(i64::from(self.sample_interval_hours))
    }
}

/// What happened to one sampled timestamp
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampOutcome {
    Record(TrainingRecord),
    NoCurrentPsi,
    NoUsableWind,
    MissingTarget(Horizon),
    Failed,
    Cancelled,
}

/// Per-outcome counts for one build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub sampled: usize,
    pub emitted: usize,
    pub no_current_psi: usize,
    pub no_usable_wind: usize,
    /// Records dropped for a missing label, indexed like [`Horizon::ALL`]
    pub missing_target: [usize; 4],
    pub failed: usize,
    pub from_cache: bool,
    pub elapsed: std::time::Duration,
}

impl BuildReport {
    fn tally(&mut self, outcome: &TimestampOutcome) {
        match outcome {
            TimestampOutcome::Record(_) => self.emitted += 1,
            TimestampOutcome::NoCurrentPsi => self.no_current_psi += 1,
            TimestampOutcome::NoUsableWind => self.no_usable_wind += 1,
            TimestampOutcome::MissingTarget(h) => {
                if let Some(i) = Horizon::ALL.iter().position(|x| x == h) {
                    self.missing_target[i] += 1;
                }
            }
            TimestampOutcome::Failed => self.failed += 1,
            TimestampOutcome::Cancelled => {}
        }
    }

    pub fn missing_targets(&self) -> usize {
        self.missing_target.iter().sum()
    }

    /// The dominant reason a run produced nothing
    pub fn exhaustion_cause(&self) -> ExhaustionCause {
        if self.sampled == 0 {
            return ExhaustionCause::NoTimestampsInRange;
        }
        // ties go to the earlier pipeline stage
        [
            (self.no_current_psi, ExhaustionCause::NoCurrentPsi),
            (self.no_usable_wind, ExhaustionCause::NoUsableWind),
            (self.missing_targets(), ExhaustionCause::InsufficientFuturePsi),
            (self.failed, ExhaustionCause::TimestampFailures),
        ]
        .into_iter()
        .rev()
        .max_by_key(|(count, _)| *count)
        .map_or(ExhaustionCause::NoTimestampsInRange, |(_, cause)| cause)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_cache {
            return write!(f, "{} records loaded from cache", self.emitted);
        }
        write!(
            f,
            "{} records from {} timestamps in {:.1}s (skipped: {} no current PSI, {} no usable wind, {} missing target [",
            self.emitted,
            self.sampled,
            self.elapsed.as_secs_f64(),
            self.no_current_psi,
            self.no_usable_wind,
            self.missing_targets(),
        )?;
        for (i, h) in Horizon::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{h}: {}", self.missing_target[i])?;
        }
        write!(f, "], {} failed)", self.failed)
    }
}

/// Read-only view handed to every worker
#[derive(Clone, Copy)]
pub struct TimestampContext<'a> {
    pub tables: &'a HistoricalTables,
    pub config: &'a BuilderConfig,
}

impl TimestampContext<'_> {
    /// Run the full pipeline for one reference time
    pub fn process(&self, timestamp: DateTime<Utc>) -> TimestampOutcome {
        let psi = self.tables.psi().national();
        let Some(current_psi) = psi.at(timestamp) else {
            return TimestampOutcome::NoCurrentPsi;
        };

        let (fires, fire_grid) = self.tables.fires_in(timestamp - self.config.fire_lookback(), timestamp);

        let needed: BTreeSet<usize> = fire_grid.iter().flatten().copied().collect();
        let weather = self.tables.weather();
        let window_end = timestamp + self.config.weather_window();

        let forecast: GridWindForecast = needed
            .into_iter()
            .filter(|&idx| weather.longest_hourly_run(idx, timestamp, window_end) >= self.config.min_wind_hours)
            .map(|idx| (weather.grid_points()[idx], weather.hourly_from(idx, timestamp, window_end)))
            .collect();
        if forecast.is_empty() {
            return TimestampOutcome::NoUsableWind;
        }

        let features = compute_features(&FeatureInputs {
            detections: fires,
            wind: &forecast,
            current_psi,
            reference_time: timestamp,
            target: self.config.target,
            wind_direction: None,
            cluster_params: self.config.cluster_params,
            simulation_hours: self.config.simulation_hours,
        });

        match complete_targets(psi, timestamp, self.config.target_tolerance()) {
            Ok(targets) => TimestampOutcome::Record(TrainingRecord::new(timestamp, features, targets)),
            Err(horizon) => TimestampOutcome::MissingTarget(horizon),
        }
    }
}

pub struct TrainingBuilder {
    config: BuilderConfig,
    tables: Arc<HistoricalTables>,
    cancel: Arc<AtomicBool>,
}

impl TrainingBuilder {
    pub fn new(config: BuilderConfig, tables: Arc<HistoricalTables>) -> Self {
        TrainingBuilder {
            config,
            tables,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag (e.g. set from Ctrl-C)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn context(&self) -> TimestampContext<'_> {
        TimestampContext {
            tables: &self.tables,
            config: &self.config,
        }
    }

    /// National PSI timestamps in the request window, thinned so accepted
    /// timestamps are at least one sample interval apart
    pub fn sample_timestamps(&self, request: &BuildRequest) -> Vec<DateTime<Utc>> {
        let (start, end) = request.window();
        let interval = request.sample_interval();

        let mut sampled = Vec::new();
        let mut last: Option<DateTime<Utc>> = None;
        for t in self.tables.psi().national().timestamps_in(start, end) {
            if last.map_or(true, |prev| t - prev >= interval) {
                sampled.push(t);
                last = Some(t);
            }
        }
        sampled
    }

    /// Build the table for `request`, honoring the configured cache policy
    pub fn build(&self, request: &BuildRequest) -> Result<(TrainingTable, BuildReport)> {
        let cache = RecordCache::new(&self.config.cache_dir);

        if self.config.cache_policy == CachePolicy::Use {
            if let Some(table) = cache.load(request)? {
                let report = BuildReport {
                    sampled: table.len(),
                    emitted: table.len(),
                    from_cache: true,
                    ..Default::default()
                };
                return Ok((table, report));
            }
        }

        let (table, report) = self.run(request)?;

        if self.config.cache_policy != CachePolicy::Disabled {
            cache.store(request, &table)?;
        }
        Ok((table, report))
    }

    /// Build without consulting or writing the cache
    pub fn run(&self, request: &BuildRequest) -> Result<(TrainingTable, BuildReport)> {
        let ctx = self.context();
        self.run_with(request, |t| ctx.process(t))
    }

    /// The parallel map, tally and failure handling of [`Self::run`] around
    /// an arbitrary per-timestamp step
    pub(crate) fn run_with<F>(&self, request: &BuildRequest, process: F) -> Result<(TrainingTable, BuildReport)>
    where
        F: Fn(DateTime<Utc>) -> TimestampOutcome + Sync,
    {
        let started = Instant::now();
        let timestamps = self.sample_timestamps(request);
        let total = timestamps.len();
        let workers = self.config.worker_count();

        tracing::info!(
            start = %request.start_date,
            end = %request.end_date,
            interval_hours = request.sample_interval_hours,
            timestamps = total,
            fires = self.tables.fire_count(),
            workers,
            "building training table"
        );

        let mut report = BuildReport {
            sampled: total,
            ..Default::default()
        };

        if total == 0 {
            return Err(BuildError::NoRecords {
                start: request.start_date,
                end: request.end_date,
                cause: ExhaustionCause::NoTimestampsInRange,
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("haze-builder-{i}"))
            .build()?;

        let processed = AtomicUsize::new(0);
        let progress_every = self.config.progress_interval.max(1);

        let outcomes: Vec<TimestampOutcome> = pool.install(|| {
            timestamps
                .par_iter()
                .map(|&t| {
                    if self.cancel.load(Ordering::Relaxed) {
                        return TimestampOutcome::Cancelled;
                    }

                    let outcome = catch_unwind(AssertUnwindSafe(|| process(t))).unwrap_or_else(|panic| {
                        let msg = panic
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_default();
                        tracing::warn!(timestamp = %t, error = %msg, "timestamp failed, skipping");
                        TimestampOutcome::Failed
                    });

                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % progress_every == 0 {
                        let elapsed = started.elapsed().as_secs_f64();
                        let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
                        let eta_min = if rate > 0.0 { (total - done) as f64 / rate / 60.0 } else { 0.0 };
                        tracing::info!(
                            done,
                            total,
                            rate = %format_args!("{rate:.1}/s"),
                            eta_min = %format_args!("{eta_min:.1}"),
                            "processing timestamps"
                        );
                    }
                    outcome
                })
                .collect()
        });

        if self.cancel.load(Ordering::Relaxed) {
            let processed = outcomes.iter().filter(|o| **o != TimestampOutcome::Cancelled).count();
            tracing::warn!(processed, total, "training build cancelled");
            return Err(BuildError::Cancelled { processed, total });
        }

        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            report.tally(&outcome);
            if let TimestampOutcome::Record(r) = outcome {
                records.push(r);
            }
        }
        report.elapsed = started.elapsed();

        tracing::info!(
            emitted = report.emitted,
            no_current_psi = report.no_current_psi,
            no_usable_wind = report.no_usable_wind,
            missing_target = report.missing_targets(),
            failed = report.failed,
            elapsed_s = report.elapsed.as_secs_f64(),
            "training build finished"
        );

        if records.is_empty() {
            let cause = report.exhaustion_cause();
            tracing::error!(start = %request.start_date, end = %request.end_date, %cause, "no training records");
            return Err(BuildError::NoRecords {
                start: request.start_date,
                end: request.end_date,
                cause,
            });
        }

        Ok((TrainingTable::from_records(records), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::fire::FireDetection;
    use crate::core_types::geo::GeoPoint;
    use crate::core_types::psi::{PsiReading, PsiTable, Region};
    use crate::core_types::units::Megawatts;
    use crate::core_types::wind::{TimedWind, WindSample};
    use crate::training::tables::WeatherGrid;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap()
    }

    fn at(hour: i64) -> DateTime<Utc> {
        t0() + Duration::hours(hour)
    }

    fn tables(psi_hours: i64, wind_hours: i64) -> HistoricalTables {
        tables_with_wind(psi_hours, 0..wind_hours)
    }

    fn tables_with_wind(psi_hours: i64, wind_hours: impl IntoIterator<Item = i64>) -> HistoricalTables {
        let grid = GeoPoint::new(1.0, 103.0);
        let fires = vec![FireDetection::new(GeoPoint::new(1.0, 103.0), Megawatts::new(100.0), Some(at(-1)))];
        let weather = WeatherGrid::from_observations(wind_hours.into_iter().map(|h| {
            (
                grid,
                TimedWind {
                    timestamp: at(h),
                    sample: WindSample::from_raw(15.0, 225.0),
                },
            )
        }));
        let psi = PsiTable::from_readings((0..psi_hours).map(|h| PsiReading::new(at(h), Region::National, 50.0)));
        HistoricalTables::new(fires, weather, psi)
    }

    fn config() -> BuilderConfig {
        BuilderConfig {
            workers: Some(2),
            cache_policy: CachePolicy::Disabled,
            ..Default::default()
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 9, 1).unwrap()
    }

    #[test]
    fn test_request_validation() {
        let later = NaiveDate::from_ymd_opt(2019, 9, 2).unwrap();
        assert!(matches!(
            BuildRequest::new(later, day(), 24),
            Err(BuildError::InvalidDateRange { .. })
        ));
        assert!(matches!(BuildRequest::new(day(), day(), 0), Err(BuildError::InvalidSampleInterval)));
    }

    #[test]
    fn test_sampling_by_interval() {
        let builder = TrainingBuilder::new(config(), Arc::new(tables(200, 200)));
        let request = BuildRequest::new(day(), day(), 6).unwrap();
        let sampled = builder.sample_timestamps(&request);
        assert_eq!(sampled, vec![at(0), at(6), at(12), at(18)]);
    }

    #[test]
    fn test_process_emits_complete_record() {
        let t = tables(200, 200);
        let cfg = config();
        let ctx = TimestampContext { tables: &t, config: &cfg };
        let TimestampOutcome::Record(r) = ctx.process(at(0)) else {
            panic!("expected a record");
        };
        assert_eq!(r.actual_psi_7d, 50.0);
        assert_eq!(r.baseline_score, 10.0);
        assert!(r.fire_risk_score > 0.0);
        assert!(r.wind_transport_score > 0.0);
    }

    #[test]
    fn test_process_skip_reasons() {
        let cfg = config();

        let short_wind = tables(200, 10);
        let ctx = TimestampContext { tables: &short_wind, config: &cfg };
        assert_eq!(ctx.process(at(0)), TimestampOutcome::NoUsableWind);
        assert_eq!(ctx.process(at(-5)), TimestampOutcome::NoCurrentPsi);

        let short_psi = tables(100, 200);
        let ctx = TimestampContext { tables: &short_psi, config: &cfg };
        assert_eq!(ctx.process(at(0)), TimestampOutcome::MissingTarget(Horizon::Days7));
    }

    #[test]
    fn test_wind_gap_before_long_run_still_qualifies() {
        let cfg = config();
        let gapped = tables_with_wind(400, [0, 1].into_iter().chain(3..168));
        let ctx = TimestampContext { tables: &gapped, config: &cfg };
        let TimestampOutcome::Record(r) = ctx.process(at(0)) else {
            panic!("expected a record");
        };
        assert!(r.wind_transport_score > 0.0);

        let late_start = tables_with_wind(400, 3..168);
        let ctx = TimestampContext { tables: &late_start, config: &cfg };
        assert!(matches!(ctx.process(at(0)), TimestampOutcome::Record(_)));

        let fragmented = tables_with_wind(400, (0..168).filter(|h| h % 20 != 19));
        let ctx = TimestampContext { tables: &fragmented, config: &cfg };
        assert_eq!(ctx.process(at(0)), TimestampOutcome::NoUsableWind);
    }

    #[test]
    fn test_panicking_timestamp_counted_as_failed() {
        let builder = TrainingBuilder::new(config(), Arc::new(tables(200, 200)));
        let ctx = builder.context();
        let request = BuildRequest::new(day(), day(), 6).unwrap();

        let (table, report) = builder
            .run_with(&request, |ts| {
                assert_ne!(ts, at(6), "bad timestamp");
                ctx.process(ts)
            })
            .unwrap();

        assert_eq!(report.sampled, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.emitted, 3);
        assert!(table.records().iter().all(|r| r.timestamp != at(6)));
    }

    #[test]
    fn test_all_timestamps_failing_is_hard_failure() {
        let builder = TrainingBuilder::new(config(), Arc::new(tables(200, 200)));
        let request = BuildRequest::new(day(), day(), 6).unwrap();
        let result = builder.run_with(&request, |_| panic!("corrupt row"));
        assert!(matches!(
            result,
            Err(BuildError::NoRecords {
                cause: ExhaustionCause::TimestampFailures,
                ..
            })
        ));
    }

    #[test]
    fn test_run_without_future_psi_fails_with_cause() {
        let builder = TrainingBuilder::new(config(), Arc::new(tables(100, 200)));
        let request = BuildRequest::new(day(), day(), 24).unwrap();
        match builder.run(&request) {
            Err(BuildError::NoRecords { cause, .. }) => assert_eq!(cause, ExhaustionCause::InsufficientFuturePsi),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_run() {
        let builder = TrainingBuilder::new(config(), Arc::new(tables(200, 200)));
        builder.cancel_flag().store(true, Ordering::Relaxed);
        let request = BuildRequest::new(day(), day(), 1).unwrap();
        assert!(matches!(
            builder.run(&request),
            Err(BuildError::Cancelled { processed: 0, total: 24 })
        ));
    }

    #[test]
    fn test_exhaustion_cause_picks_dominant() {
        let report = BuildReport {
            sampled: 10,
            no_usable_wind: 7,
            missing_target: [0, 0, 0, 3],
            ..Default::default()
        };
        assert_eq!(report.exhaustion_cause(), ExhaustionCause::NoUsableWind);

        let tie = BuildReport {
            sampled: 4,
            no_usable_wind: 2,
            failed: 2,
            ..Default::default()
        };
        assert_eq!(tie.exhaustion_cause(), ExhaustionCause::NoUsableWind);
        assert_eq!(BuildReport::default().exhaustion_cause(), ExhaustionCause::NoTimestampsInRange);
    }
}
