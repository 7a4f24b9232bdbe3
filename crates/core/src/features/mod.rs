//! Feature scoring
//!
//! Three bounded signals describe the haze outlook for a target location at a
//! reference time:
//!
//! - **Fire risk** ([`fire_risk`]): how much burning is going on nearby, and
//!   how fresh and intense it is
//! - **Wind transport** ([`trajectory`]): whether forecast winds carry smoke
//!   from the fire clusters ([`clustering`]) over the target
//! - **Baseline** ([`baseline`]): the current PSI, as a persistence signal
//!
//! All scorers are pure and read-only over their inputs, so workers call them
//! concurrently without synchronization.

pub mod baseline;
pub mod clustering;
pub mod fire_risk;
pub mod geospatial;
pub mod trajectory;

pub use baseline::{calculate_baseline_score, PSI_CAP};
pub use clustering::{cluster_fires, ClusterParams, DEFAULT_CLUSTER_RADIUS};
pub use fire_risk::{calculate_fire_risk_score, MAX_SCORE};
pub use geospatial::{angle_difference, bearing, distance};
pub use trajectory::{
    calculate_proximity_score, calculate_wind_transport_score, simulate_trajectory, GridWindForecast,
    Trajectory, WindField, DEFAULT_SIMULATION_HOURS,
};

use crate::core_types::fire::FireDetection;
use crate::core_types::geo::GeoPoint;
use crate::core_types::units::Degrees;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three model inputs, each in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub fire_risk_score: f64,
    pub wind_transport_score: f64,
    pub baseline_score: f64,
}

/// Everything needed to score one (reference time, target) pair
pub struct FeatureInputs<'a, W: WindField + ?Sized> {
    pub detections: &'a [FireDetection],
    pub wind: &'a W,
    pub current_psi: f64,
    pub reference_time: DateTime<Utc>,
    pub target: GeoPoint,
    /// Wind origin for the fire risk favorability weight; neutral if `None`
    pub wind_direction: Option<Degrees>,
    pub cluster_params: ClusterParams,
    pub simulation_hours: usize,
}

impl<'a, W: WindField + ?Sized> FeatureInputs<'a, W> {
    /// Inputs with the default target, clustering and simulation horizon
    pub fn new(detections: &'a [FireDetection], wind: &'a W, current_psi: f64, reference_time: DateTime<Utc>) -> Self {
        FeatureInputs {
            detections,
            wind,
            current_psi,
            reference_time,
            target: GeoPoint::SINGAPORE,
            wind_direction: None,
            cluster_params: ClusterParams::default(),
            simulation_hours: DEFAULT_SIMULATION_HOURS,
        }
    }
}

/// Score one (reference time, target) pair
///
/// Wind transport is 0 when there are no detections.
pub fn compute_features<W: WindField + ?Sized>(inputs: &FeatureInputs<'_, W>) -> FeatureVector {
    let fire_risk_score = calculate_fire_risk_score(
        inputs.detections,
        inputs.target,
        inputs.reference_time,
        inputs.wind_direction,
    );

    let clusters = cluster_fires(inputs.detections, inputs.cluster_params);
    let wind_transport_score =
        calculate_wind_transport_score(&clusters, inputs.wind, inputs.target, inputs.simulation_hours);

    FeatureVector {
        fire_risk_score,
        wind_transport_score,
        baseline_score: calculate_baseline_score(inputs.current_psi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::units::Megawatts;
    use crate::core_types::wind::constant_wind;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_no_fires_only_baseline() {
        let wind = constant_wind(10.0, 225.0, 24);
        let t = Utc.with_ymd_and_hms(2019, 9, 15, 0, 0, 0).unwrap();
        let fv = compute_features(&FeatureInputs::new(&[], wind.as_slice(), 100.0, t));
        assert_eq!(fv.fire_risk_score, 0.0);
        assert_eq!(fv.wind_transport_score, 0.0);
        assert_eq!(fv.baseline_score, 20.0);
    }

    #[test]
    fn test_all_scores_in_range() {
        let t = Utc.with_ymd_and_hms(2019, 9, 15, 0, 0, 0).unwrap();
        let fires: Vec<_> = (0..50)
            .map(|i| {
                FireDetection::new(
                    GeoPoint::new(0.5 + f64::from(i) * 0.02, 101.5),
                    Megawatts::new(800.0),
                    Some(t - Duration::hours(2)),
                )
            })
            .collect();
        let wind = constant_wind(20.0, 225.0, 24);
        let fv = compute_features(&FeatureInputs::new(&fires, wind.as_slice(), 700.0, t));
        for s in [fv.fire_risk_score, fv.wind_transport_score, fv.baseline_score] {
            assert!((0.0..=100.0).contains(&s), "{fv:?}");
        }
    }
}
