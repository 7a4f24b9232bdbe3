//! Density-based grouping of fire detections
//!
//! Two detections share a cluster when they are linked by a chain of
//! pairwise haversine distances no longer than the clustering radius. This is
//! DBSCAN over the haversine metric: with `min_samples = 1` (the default)
//! every detection is a core point and clusters are exactly the connected
//! components of the radius graph. The number of clusters is never chosen up
//! front.
//!
//! Neighbor queries go through a latitude-sorted index. A great-circle
//! distance is never shorter than the meridional arc between the two
//! latitudes, so only detections inside the latitude band
//! `lat ± radius / 111.2 km` need a haversine check.
//!
//! Detections DBSCAN labels as noise (possible only with `min_samples > 1`)
//! become clusters of their own, so every detection lands in exactly one
//! cluster.

use crate::core_types::fire::{FireCluster, FireDetection};
use crate::core_types::units::Kilometers;
use crate::features::geospatial::{distance, EARTH_RADIUS_KM};
use serde::{Deserialize, Serialize};

/// Default clustering radius
pub const DEFAULT_CLUSTER_RADIUS: Kilometers = Kilometers::new(50.0);

/// Clustering parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Maximum link distance between neighboring detections
    pub radius: Kilometers,
    /// Neighbors (including the point itself) required for a core point
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            radius: DEFAULT_CLUSTER_RADIUS,
            min_samples: 1,
        }
    }
}

impl ClusterParams {
    pub fn with_radius(radius: Kilometers) -> Self {
        ClusterParams {
            radius,
            ..Default::default()
        }
    }
}

/// Latitude-sorted index for radius queries
struct LatitudeIndex {
    /// Indices of detections with a finite latitude, ordered by latitude
    order: Vec<usize>,
    /// Latitudes in `order` order
    lats: Vec<f64>,
}

impl LatitudeIndex {
    fn build(detections: &[FireDetection]) -> Self {
        let mut order: Vec<usize> = (0..detections.len())
            .filter(|&i| detections[i].position.latitude.is_finite())
            .collect();
        order.sort_by(|&a, &b| {
            detections[a]
                .position
                .latitude
                .total_cmp(&detections[b].position.latitude)
        });
        let lats = order.iter().map(|&i| detections[i].position.latitude).collect();
        LatitudeIndex { order, lats }
    }

    /// All detections within `radius` of detection `i`, always including `i`
    /// itself. Returned in ascending index order so expansion is deterministic.
    fn query_radius(&self, detections: &[FireDetection], i: usize, radius: Kilometers) -> Vec<usize> {
        let center = detections[i].position;
        let band = (*radius / EARTH_RADIUS_KM).to_degrees() * (1.0 + 1e-9);

        let mut found = vec![i];
        if center.is_finite() {
            let lo = self.lats.partition_point(|&lat| lat < center.latitude - band);
            let hi = self.lats.partition_point(|&lat| lat <= center.latitude + band);
            for &j in &self.order[lo..hi.max(lo)] {
                if j != i && *distance(center, detections[j].position) <= *radius {
                    found.push(j);
                }
            }
        }
        found.sort_unstable();
        found
    }
}

const UNVISITED: usize = usize::MAX;
const NOISE: usize = usize::MAX - 1;

/// Cluster label per detection; `None` marks noise
fn label_detections(detections: &[FireDetection], params: ClusterParams) -> (Vec<Option<usize>>, usize) {
    let index = LatitudeIndex::build(detections);
    let min_samples = params.min_samples.max(1);

    let mut labels = vec![UNVISITED; detections.len()];
    let mut next_cluster = 0usize;

    for seed in 0..detections.len() {
        if labels[seed] != UNVISITED {
            continue;
        }

        let neighbors = index.query_radius(detections, seed, params.radius);
        if neighbors.len() < min_samples {
            labels[seed] = NOISE;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[seed] = cluster;

        let mut frontier: Vec<usize> = neighbors;
        let mut cursor = 0;
        while cursor < frontier.len() {
            let p = frontier[cursor];
            cursor += 1;

            if labels[p] == NOISE {
                // border point reached from a core point
                labels[p] = cluster;
                continue;
            }
            if labels[p] != UNVISITED {
                continue;
            }
            labels[p] = cluster;

            let reach = index.query_radius(detections, p, params.radius);
            if reach.len() >= min_samples {
                frontier.extend(reach.into_iter().filter(|&q| labels[q] == UNVISITED || labels[q] == NOISE));
            }
        }
    }

    let labels = labels
        .into_iter()
        .map(|l| if l == NOISE || l == UNVISITED { None } else { Some(l) })
        .collect();
    (labels, next_cluster)
}

enum Group<'a> {
    Members(Vec<&'a FireDetection>),
    Noise(&'a FireDetection),
}

/// Group detections into clusters (centroid = mean position, FRP = sum)
///
/// Detections labelled noise are kept as singleton clusters. Output order
/// follows the lowest-index member of each cluster, so it is deterministic
/// for a given input order and parameters.
pub fn cluster_fires(detections: &[FireDetection], params: ClusterParams) -> Vec<FireCluster> {
    if detections.is_empty() {
        return Vec::new();
    }

    let (labels, cluster_count) = label_detections(detections, params);

    let mut slot: Vec<Option<usize>> = vec![None; cluster_count];
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut noise = 0usize;
    for (d, label) in detections.iter().zip(&labels) {
        match label {
            Some(c) => {
                let g = *slot[*c].get_or_insert_with(|| {
                    groups.push(Group::Members(Vec::new()));
                    groups.len() - 1
                });
                if let Group::Members(members) = &mut groups[g] {
                    members.push(d);
                }
            }
            None => {
                noise += 1;
                groups.push(Group::Noise(d));
            }
        }
    }

    if noise > 0 {
        tracing::debug!(
            detections = detections.len(),
            clusters = cluster_count,
            noise,
            "noise detections kept as singleton clusters"
        );
    }

    groups
        .into_iter()
        .filter_map(|group| match group {
            Group::Members(members) => FireCluster::from_members(members),
            Group::Noise(d) => Some(FireCluster::singleton(d)),
        })
        .collect()
}
