//! Haze Forecasting Core Library
//!
//! Feature engineering and smoke transport simulation for forecasting
//! Singapore's Pollutant Standards Index (PSI) from satellite fire detections,
//! forecast winds and current air quality.
//!
//! ## Features
//!
//! Three bounded scores in `[0, 100]` feed the downstream PSI models:
//! - Fire risk: intensity, distance, recency and wind weighted hotspot sum
//! - Wind transport: hour-by-hour advection of fire clusters, scored by how
//!   close the simulated smoke passes to the city
//! - Baseline: current PSI rescaled as a persistence signal
//!
//! ## Training data
//!
//! The [`training`] module samples years of history in parallel, labels each
//! sample with the PSI observed 24 h, 48 h, 72 h and 7 days later, and caches
//! the resulting tables on disk.

// Core types and utilities
pub mod core_types;

// Scoring and simulation
pub mod features;

// Historical training-record builder
pub mod training;

// Re-export core types
pub use core_types::{ConfidenceClass, FireCluster, FireDetection, GeoPoint, WindSample};
pub use core_types::{Degrees, Hours, Kilometers, KilometersPerHour, Megawatts};
pub use core_types::{PsiReading, PsiSeries, PsiTable, Region};

// Re-export scoring entry points
pub use features::{compute_features, FeatureInputs, FeatureVector};
pub use features::{
    calculate_baseline_score, calculate_fire_risk_score, calculate_proximity_score,
    calculate_wind_transport_score, cluster_fires, simulate_trajectory,
};
pub use features::{ClusterParams, GridWindForecast, Trajectory, WindField};

// Re-export training types
pub use training::{BuildError, BuildReport, BuildRequest, BuilderConfig, CachePolicy, TrainingBuilder};
pub use training::{Horizon, TrainingRecord, TrainingTable};

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
