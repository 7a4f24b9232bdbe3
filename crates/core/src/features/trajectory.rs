//! Smoke trajectory simulation and wind transport score
//!
//! Each fire cluster's centroid is advected hour by hour with the forecast
//! wind. The closest approach of the simulated path to the target city is
//! turned into a 0-100 proximity score, weighted by the cluster's FRP, and
//! summed over clusters.
//!
//! # Advection step
//!
//! ```text
//! u = -speed × sin(dir)          v = -speed × cos(dir)      (dir = wind origin)
//! Δlat = 0.7 × v / 111
//! Δlon = 0.7 × u / (111 × cos(lat))
//! ```
//!
//! The 0.7 damping accounts for smoke settling and dispersing rather than
//! riding the wind as a pure air parcel.

use crate::core_types::fire::FireCluster;
use crate::core_types::geo::GeoPoint;
use crate::core_types::units::{Hours, Kilometers, Megawatts};
use crate::core_types::wind::WindSample;
use crate::features::fire_risk::MAX_SCORE;
use crate::features::geospatial::distance;

/// Fraction of the wind displacement the smoke actually travels
pub const SMOKE_DAMPING_FACTOR: f64 = 0.7;

/// Approximate length of one degree of latitude (km)
pub const KM_PER_DEGREE: f64 = 111.0;

/// Closest approach at or below which a plume counts as over the city
pub const FULL_PROXIMITY_DISTANCE: Kilometers = Kilometers::new(50.0);

/// Closest approach beyond which a plume no longer counts
pub const ZERO_PROXIMITY_DISTANCE: Kilometers = Kilometers::new(200.0);

/// Cluster FRP that weights a proximity score 1:1
pub const TRANSPORT_FRP_REFERENCE: Megawatts = Megawatts::new(1000.0);

/// Default simulation horizon
pub const DEFAULT_SIMULATION_HOURS: usize = 24;

/// Source of hourly wind sequences for a position
///
/// A plain slice is a spatially uniform forecast; [`GridWindForecast`]
/// resolves the nearest grid point.
pub trait WindField {
    /// Hourly samples starting at the reference time, or `None` when no wind
    /// is known for `position`.
    fn wind_at(&self, position: GeoPoint) -> Option<&[WindSample]>;
}

impl WindField for [WindSample] {
    fn wind_at(&self, _position: GeoPoint) -> Option<&[WindSample]> {
        Some(self)
    }
}

impl WindField for Vec<WindSample> {
    fn wind_at(&self, _position: GeoPoint) -> Option<&[WindSample]> {
        Some(self.as_slice())
    }
}

/// Wind sequences at a set of grid points, resolved by nearest point
#[derive(Debug, Clone, Default)]
pub struct GridWindForecast {
    points: Vec<(GeoPoint, Vec<WindSample>)>,
}

impl GridWindForecast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grid point's hourly sequence
    pub fn insert(&mut self, grid_point: GeoPoint, samples: Vec<WindSample>) {
        self.points.push((grid_point, samples));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn grid_points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.points.iter().map(|(p, _)| *p)
    }
}

impl FromIterator<(GeoPoint, Vec<WindSample>)> for GridWindForecast {
    fn from_iter<I: IntoIterator<Item = (GeoPoint, Vec<WindSample>)>>(iter: I) -> Self {
        GridWindForecast {
            points: iter.into_iter().collect(),
        }
    }
}

impl WindField for GridWindForecast {
    fn wind_at(&self, position: GeoPoint) -> Option<&[WindSample]> {
        // first of equally distant points wins
        let mut best: Option<(Kilometers, &[WindSample])> = None;
        for (grid_point, samples) in &self.points {
            let d = distance(position, *grid_point);
            let closer = match best {
                Some((best_d, _)) => d < best_d,
                None => !d.is_nan(),
            };
            if closer {
                best = Some((d, samples.as_slice()));
            }
        }
        best.map(|(_, s)| s)
    }
}

/// Simulated path of a smoke parcel; point 0 is the start position
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    points: Vec<GeoPoint>,
}

impl Trajectory {
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn start(&self) -> GeoPoint {
        self.points[0]
    }

    pub fn end(&self) -> GeoPoint {
        self.points[self.points.len() - 1]
    }

    /// Number of simulated hours (points minus the start)
    pub fn hours(&self) -> usize {
        self.points.len() - 1
    }

    /// Closest approach of any point to `target`
    ///
    /// NaN distances (invalid coordinates) are ignored; if every distance is
    /// NaN the result is NaN.
    pub fn min_distance_to(&self, target: GeoPoint) -> Kilometers {
        self.points
            .iter()
            .map(|p| distance(*p, target))
            .filter(|d| !d.is_nan())
            .min()
            .unwrap_or(Kilometers::new(f64::NAN))
    }
}

/// One hour of advection from `position` under `wind`
pub fn advect(position: GeoPoint, wind: &WindSample) -> GeoPoint {
    let (u, v) = wind.velocity_components();
    let east_km = u * SMOKE_DAMPING_FACTOR * *Hours::ONE;
    let north_km = v * SMOKE_DAMPING_FACTOR * *Hours::ONE;

    let d_lat = north_km / KM_PER_DEGREE;
    let d_lon = east_km / (KM_PER_DEGREE * position.latitude.to_radians().cos());

    GeoPoint::new(position.latitude + d_lat, position.longitude + d_lon)
}

/// Advect `start` through up to `hours` hourly wind samples
///
/// Stops early when `wind` is shorter than `hours`; no extrapolation. The
/// result holds `min(hours, wind.len()) + 1` points.
pub fn simulate_trajectory(start: GeoPoint, wind: &[WindSample], hours: usize) -> Trajectory {
    let steps = hours.min(wind.len());
    let mut points = Vec::with_capacity(steps + 1);
    points.push(start);

    let mut current = start;
    for sample in &wind[..steps] {
        current = advect(current, sample);
        points.push(current);
    }

    Trajectory { points }
}

/// Proximity score in `[0, 100]` for a closest-approach distance
///
/// 100 below 50 km, linear down to 0 at 200 km, 0 beyond.
pub fn calculate_proximity_score(min_distance: Kilometers) -> f64 {
    let full = *FULL_PROXIMITY_DISTANCE;
    let zero = *ZERO_PROXIMITY_DISTANCE;

    if *min_distance < full {
        MAX_SCORE
    } else if *min_distance < zero {
        MAX_SCORE * (1.0 - (*min_distance - full) / (zero - full))
    } else {
        0.0
    }
}

/// Wind transport score in `[0, 100]`
///
/// For each cluster: simulate its trajectory under `wind`, convert the
/// closest approach to `target` into a proximity score, and weight it by
/// `total_frp / 1000 MW`. The weighted proximities are summed and capped.
/// Clusters without wind stay at their centroid.
pub fn calculate_wind_transport_score<W>(
    clusters: &[FireCluster],
    wind: &W,
    target: GeoPoint,
    simulation_hours: usize,
) -> f64
where
    W: WindField + ?Sized,
{
    if clusters.is_empty() {
        return 0.0;
    }

    let total: f64 = clusters
        .iter()
        .map(|cluster| {
            let samples = wind.wind_at(cluster.centroid).unwrap_or(&[]);
            let trajectory = simulate_trajectory(cluster.centroid, samples, simulation_hours);
            let proximity = calculate_proximity_score(trajectory.min_distance_to(target));
            proximity * (cluster.total_frp / TRANSPORT_FRP_REFERENCE)
        })
        .filter(|w| w.is_finite())
        .sum();

    total.clamp(0.0, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::wind::constant_wind;
    use approx::assert_relative_eq;

    fn cluster(lat: f64, lon: f64, frp: f64) -> FireCluster {
        FireCluster {
            centroid: GeoPoint::new(lat, lon),
            total_frp: Megawatts::new(frp),
            size: 1,
        }
    }

    #[test]
    fn test_calm_trajectory_stays_put() {
        let start = GeoPoint::new(0.5, 101.5);
        let traj = simulate_trajectory(start, &constant_wind(0.0, 90.0, 24), 24);
        assert_eq!(traj.points().len(), 25);
        assert!(traj.points().iter().all(|p| *p == start));
    }

    #[test]
    fn test_westerly_moves_east_every_hour() {
        let traj = simulate_trajectory(GeoPoint::new(0.5, 101.5), &constant_wind(10.0, 270.0, 24), 24);
        assert_eq!(traj.hours(), 24);
        for pair in traj.points().windows(2) {
            assert!(pair[1].longitude > pair[0].longitude);
            assert_relative_eq!(pair[1].latitude, pair[0].latitude, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_step_length_applies_damping() {
        let next = advect(GeoPoint::new(0.0, 100.0), &WindSample::from_raw(111.0, 180.0));
        // 111 km/h southerly, damped to 77.7 km northwards = 0.7°
        assert_relative_eq!(next.latitude, 0.7, epsilon = 1e-9);
        assert_relative_eq!(next.longitude, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trajectory_turns_with_wind() {
        let mut wind = constant_wind(10.0, 270.0, 12);
        wind.extend(constant_wind(10.0, 180.0, 12));
        let start = GeoPoint::new(0.5, 101.5);
        let traj = simulate_trajectory(start, &wind, 24);

        let mid = traj.points()[12];
        assert!(mid.longitude > start.longitude);
        assert!(traj.end().latitude > mid.latitude);
    }

    #[test]
    fn test_short_wind_stops_early() {
        let traj = simulate_trajectory(GeoPoint::new(0.0, 100.0), &constant_wind(10.0, 0.0, 5), 24);
        assert_eq!(traj.points().len(), 6);
        let empty = simulate_trajectory(GeoPoint::new(0.0, 100.0), &[], 24);
        assert_eq!(empty.points().len(), 1);
    }

    #[test]
    fn test_proximity_breakpoints() {
        assert_eq!(calculate_proximity_score(Kilometers::new(10.0)), 100.0);
        assert_eq!(calculate_proximity_score(Kilometers::new(500.0)), 0.0);
        assert_eq!(calculate_proximity_score(Kilometers::new(50.0)), 100.0);
        assert_relative_eq!(calculate_proximity_score(Kilometers::new(125.0)), 50.0, epsilon = 1e-9);
        assert_eq!(calculate_proximity_score(Kilometers::new(200.0)), 0.0);
    }

    #[test]
    fn test_proximity_monotonic_over_ramp() {
        let mut previous = f64::INFINITY;
        for km in 50..=200 {
            let s = calculate_proximity_score(Kilometers::new(f64::from(km)));
            assert!(s <= previous);
            previous = s;
        }
    }

    #[test]
    fn test_transport_empty_clusters() {
        let wind = constant_wind(10.0, 180.0, 24);
        assert_eq!(calculate_wind_transport_score(&[], wind.as_slice(), GeoPoint::SINGAPORE, 24), 0.0);
    }

    #[test]
    fn test_transport_wind_toward_target_beats_away() {
        let c = [cluster(0.5, 101.5, 500.0)];
        let toward = constant_wind(15.0, 225.0, 24);
        let away = constant_wind(15.0, 45.0, 24);
        let s_toward = calculate_wind_transport_score(&c, toward.as_slice(), GeoPoint::SINGAPORE, 24);
        let s_away = calculate_wind_transport_score(&c, away.as_slice(), GeoPoint::SINGAPORE, 24);
        assert!(s_toward > s_away, "toward={s_toward} away={s_away}");
    }

    #[test]
    fn test_transport_capped_for_extreme_frp() {
        let clusters: Vec<_> = (0..10).map(|i| cluster(1.3 + f64::from(i) * 0.01, 103.8, 10_000.0)).collect();
        let wind = constant_wind(5.0, 180.0, 24);
        let s = calculate_wind_transport_score(&clusters, wind.as_slice(), GeoPoint::SINGAPORE, 24);
        assert_eq!(s, 100.0);
    }

    #[test]
    fn test_grid_forecast_picks_nearest_point() {
        let mut grid = GridWindForecast::new();
        grid.insert(GeoPoint::new(0.0, 100.0), constant_wind(1.0, 0.0, 24));
        grid.insert(GeoPoint::new(2.0, 104.0), constant_wind(2.0, 0.0, 24));

        let near_first = grid.wind_at(GeoPoint::new(0.2, 100.1)).unwrap();
        assert_eq!(*near_first[0].speed, 1.0);
        let near_second = grid.wind_at(GeoPoint::new(1.9, 103.5)).unwrap();
        assert_eq!(*near_second[0].speed, 2.0);
        assert!(GridWindForecast::new().wind_at(GeoPoint::SINGAPORE).is_none());
    }

    #[test]
    fn test_cluster_without_wind_scored_at_centroid() {
        let c = [cluster(1.36, 103.82, 1000.0)];
        let s = calculate_wind_transport_score(&c, &GridWindForecast::new(), GeoPoint::SINGAPORE, 24);
        assert_eq!(s, 100.0);
    }
}
