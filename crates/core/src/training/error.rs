//! Error types for loading historical data and building training tables

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Why a build run produced no records at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionCause {
    /// No national PSI timestamps fall inside the requested range
    NoTimestampsInRange,
    /// Sampled timestamps had no national PSI reading
    NoCurrentPsi,
    /// No fire had a grid point with enough contiguous hourly wind
    NoUsableWind,
    /// PSI data does not extend far enough past the range to label horizons
    InsufficientFuturePsi,
    /// Every processed timestamp failed
    TimestampFailures,
}

impl fmt::Display for ExhaustionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ExhaustionCause::NoTimestampsInRange => "no PSI timestamps in the requested range",
            ExhaustionCause::NoCurrentPsi => "no national PSI reading at any sampled timestamp",
            ExhaustionCause::NoUsableWind => {
                "no grid point with enough contiguous hourly wind near the detected fires"
            }
            ExhaustionCause::InsufficientFuturePsi => {
                "PSI data does not extend far enough into the future; it must cover at least 7 days past the end date"
            }
            ExhaustionCause::TimestampFailures => "every timestamp failed during processing",
        };
        f.write_str(msg)
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker pool error {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("sample interval must be at least one hour")]
    InvalidSampleInterval,

    #[error("missing data source {}", .0.display())]
    MissingSource(PathBuf),

    #[error("invalid {source_name} data: {message}")]
    InvalidData { source_name: &'static str, message: String },

    #[error("run cancelled after {processed} of {total} timestamps")]
    Cancelled { processed: usize, total: usize },

    #[error("no training records for {start} to {end}: {cause}")]
    NoRecords {
        start: NaiveDate,
        end: NaiveDate,
        cause: ExhaustionCause,
    },
}
