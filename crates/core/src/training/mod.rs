//! Historical training-record builder
//!
//! Turns years of fire, wind and PSI history into labelled rows: for each
//! sampled reference time the three feature scores plus the national PSI
//! observed 24 h, 48 h, 72 h and 7 days later. Timestamps are processed in
//! parallel over read-only [`HistoricalTables`]; finished tables are written
//! to a content-addressed [`RecordCache`].
//!
//! # Pipeline per timestamp
//! 1. Current national PSI (exact timestamp), else skipped
//! 2. Detections acquired in the lookback window
//! 3. Wind for each distinct grid point nearest to those detections, kept if
//!    it has enough contiguous hours; no qualifying point means skipped
//! 4. Features (fire risk, clustering plus wind transport, baseline)
//! 5. Labels at every horizon within the tolerance window
//! 6. The record is kept only when all four labels resolved

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod sources;
pub mod tables;
pub mod targets;

pub use builder::{BuildReport, BuildRequest, TimestampOutcome, TrainingBuilder};
pub use cache::RecordCache;
pub use config::{BuilderConfig, CachePolicy};
pub use error::{BuildError, ExhaustionCause, Result};
pub use sources::{DataSources, WindSpeedUnit};
pub use tables::{clear_table_cache, load_cached, HistoricalTables, WeatherGrid};
pub use targets::{complete_targets, resolve_targets};

use crate::features::FeatureVector;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forecast lead time of a training label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "48h")]
    Hours48,
    #[serde(rename = "72h")]
    Hours72,
    #[serde(rename = "7d")]
    Days7,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [Horizon::Hours24, Horizon::Hours48, Horizon::Hours72, Horizon::Days7];

    pub const fn hours(self) -> i64 {
        match self {
            Horizon::Hours24 => 24,
            Horizon::Hours48 => 48,
            Horizon::Hours72 => 72,
            Horizon::Days7 => 168,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::hours(self.hours())
    }

    /// Label column in the training table
    pub const fn column(self) -> &'static str {
        match self {
            Horizon::Hours24 => "actual_psi_24h",
            Horizon::Hours48 => "actual_psi_48h",
            Horizon::Hours72 => "actual_psi_72h",
            Horizon::Days7 => "actual_psi_7d",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Horizon::Hours24 => "24h",
            Horizon::Hours48 => "48h",
            Horizon::Hours72 => "72h",
            Horizon::Days7 => "7d",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" | "24" => Ok(Horizon::Hours24),
            "48h" | "48" => Ok(Horizon::Hours48),
            "72h" | "72" => Ok(Horizon::Hours72),
            "7d" | "168h" | "168" => Ok(Horizon::Days7),
            other => Err(format!("unknown horizon '{other}' (expected 24h, 48h, 72h or 7d)")),
        }
    }
}

/// One labelled row; field order is the cache column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub timestamp: DateTime<Utc>,
    pub fire_risk_score: f64,
    pub wind_transport_score: f64,
    pub baseline_score: f64,
    pub actual_psi_24h: f64,
    pub actual_psi_48h: f64,
    pub actual_psi_72h: f64,
    pub actual_psi_7d: f64,
}

impl TrainingRecord {
    /// Record from features and labels in [`Horizon::ALL`] order
    pub fn new(timestamp: DateTime<Utc>, features: FeatureVector, targets: [f64; 4]) -> Self {
        let [actual_psi_24h, actual_psi_48h, actual_psi_72h, actual_psi_7d] = targets;
        TrainingRecord {
            timestamp,
            fire_risk_score: features.fire_risk_score,
            wind_transport_score: features.wind_transport_score,
            baseline_score: features.baseline_score,
            actual_psi_24h,
            actual_psi_48h,
            actual_psi_72h,
            actual_psi_7d,
        }
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector {
            fire_risk_score: self.fire_risk_score,
            wind_transport_score: self.wind_transport_score,
            baseline_score: self.baseline_score,
        }
    }

    pub fn target(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Hours24 => self.actual_psi_24h,
            Horizon::Hours48 => self.actual_psi_48h,
            Horizon::Hours72 => self.actual_psi_72h,
            Horizon::Days7 => self.actual_psi_7d,
        }
    }
}

/// One row of a single-horizon view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonSample {
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    pub target: f64,
}

/// Complete training records in ascending timestamp order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingTable {
    records: Vec<TrainingRecord>,
}

impl TrainingTable {
    /// Sort by timestamp; records sharing a timestamp keep their input order
    pub fn from_records(mut records: Vec<TrainingRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        TrainingTable { records }
    }

    pub fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TrainingRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feature rows paired with one horizon's label
    pub fn for_horizon(&self, horizon: Horizon) -> Vec<HorizonSample> {
        self.records
            .iter()
            .map(|r| HorizonSample {
                timestamp: r.timestamp,
                features: r.features(),
                target: r.target(horizon),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(hour: u32, base: f64) -> TrainingRecord {
        TrainingRecord::new(
            Utc.with_ymd_and_hms(2019, 9, 1, hour, 0, 0).unwrap(),
            FeatureVector {
                fire_risk_score: base,
                wind_transport_score: base + 1.0,
                baseline_score: base + 2.0,
            },
            [10.0, 20.0, 30.0, 40.0],
        )
    }

    #[test]
    fn test_table_sorted_by_timestamp() {
        let table = TrainingTable::from_records(vec![record(5, 0.0), record(1, 1.0), record(3, 2.0)]);
        let hours: Vec<_> = table.records().iter().map(|r| r.fire_risk_score).collect();
        assert_eq!(hours, vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_horizon_view() {
        let table = TrainingTable::from_records(vec![record(0, 5.0)]);
        let view = table.for_horizon(Horizon::Hours72);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].target, 30.0);
        assert_eq!(view[0].features.wind_transport_score, 6.0);
        assert_eq!(table.for_horizon(Horizon::Days7)[0].target, 40.0);
    }

    #[test]
    fn test_horizon_names() {
        assert_eq!(Horizon::Days7.hours(), 168);
        assert_eq!(Horizon::Days7.column(), "actual_psi_7d");
        assert_eq!("48h".parse::<Horizon>(), Ok(Horizon::Hours48));
        assert!("1w".parse::<Horizon>().is_err());
    }
}
