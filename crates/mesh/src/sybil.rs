//! Sybil detection by spatial and temporal correlation.
//!
//! One physical transmitter presenting several identities tends to report
//! positions that coincide and to beacon at the same instants. Two
//! neighbors are clustered when enough of their recent samples pair up
//! closely in both time and space.

use crate::neighbor::{BeaconSample, NeighborEntry, NeighborTable};
use serde::{Deserialize, Serialize};
use vanetsec_core::{NodeId, ProtocolConfig, Timestamp};

/// Thresholds for the clustering heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SybilConfig {
    /// Maximum planar distance between paired samples in metres
    pub proximity_m: f64,
    /// Paired samples required to cluster two identities
    pub min_samples: usize,
    /// Maximum beacon time difference between paired samples
    pub timing_window_ms: Timestamp,
}

impl Default for SybilConfig {
    fn default() -> Self {
        Self {
            proximity_m: 1.0,
            min_samples: 3,
            timing_window_ms: 200,
        }
    }
}

impl From<&ProtocolConfig> for SybilConfig {
    fn from(protocol: &ProtocolConfig) -> Self {
        Self {
            proximity_m: protocol.sybil_proximity_m,
            min_samples: protocol.sybil_min_samples,
            timing_window_ms: protocol.sybil_timing_window_ms(),
        }
    }
}

impl SybilConfig {
    fn pairs(&self, a: &BeaconSample, b: &BeaconSample) -> bool {
        a.sent_at.abs_diff(b.sent_at) <= self.timing_window_ms
            && a.position.planar_distance_to(&b.position) <= self.proximity_m
    }

    /// Number of samples of `a` that pair with some sample of `b`.
    pub fn correlated_samples(&self, a: &NeighborEntry, b: &NeighborEntry) -> usize {
        a.samples()
            .filter(|sample| b.samples().any(|other| self.pairs(sample, other)))
            .count()
    }

    /// Whether two neighbors look like one transmitter.
    pub fn is_cluster(&self, a: &NeighborEntry, b: &NeighborEntry) -> bool {
        a.id != b.id && self.correlated_samples(a, b) >= self.min_samples
    }

    /// Neighbors clustered with `subject`, sorted by id.
    pub fn cluster_mates(&self, table: &NeighborTable, subject: &str) -> Vec<NodeId> {
        let Some(entry) = table.get(subject) else {
            return Vec::new();
        };
        let mut mates: Vec<NodeId> = table
            .iter()
            .filter(|other| self.is_cluster(entry, other))
            .map(|other| other.id.clone())
            .collect();
        mates.sort();
        mates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Beacon;
    use vanetsec_core::{MotionLimits, Position};

    fn beacon(id: &str, x: f64, y: f64, t: Timestamp) -> Beacon {
        Beacon {
            id: id.to_string(),
            position: Position::new(x, y, 0.0, t),
            speed_kmh: 36.0,
            heading: 0.0,
        }
    }

    fn feed(table: &mut NeighborTable, id: &str, y: f64, rounds: u64) {
        for round in 0..rounds {
            let t = round * 1_000;
            let _ = table.upsert_neighbor(&beacon(id, round as f64 * 10.0, y, t), t, t);
        }
    }

    #[test]
    fn test_colocated_identities_clustered() {
        let config = SybilConfig::default();
        let mut table = NeighborTable::new(16, 10_000, MotionLimits::default());
        feed(&mut table, "vehicle_1", 0.0, 3);
        feed(&mut table, "vehicle_1_sybil_0", 0.4, 3);

        assert_eq!(
            config.cluster_mates(&table, "vehicle_1"),
            vec!["vehicle_1_sybil_0".to_string()]
        );
        assert_eq!(
            config.cluster_mates(&table, "vehicle_1_sybil_0"),
            vec!["vehicle_1".to_string()]
        );
    }

    #[test]
    fn test_too_few_samples_not_clustered() {
        let config = SybilConfig::default();
        let mut table = NeighborTable::new(16, 10_000, MotionLimits::default());
        feed(&mut table, "vehicle_1", 0.0, 2);
        feed(&mut table, "vehicle_2", 0.4, 2);

        assert!(config.cluster_mates(&table, "vehicle_1").is_empty());
    }

    #[test]
    fn test_separated_vehicles_not_clustered() {
        let config = SybilConfig::default();
        let mut table = NeighborTable::new(16, 10_000, MotionLimits::default());
        feed(&mut table, "vehicle_1", 0.0, 5);
        feed(&mut table, "vehicle_2", 3.5, 5);

        assert!(config.cluster_mates(&table, "vehicle_1").is_empty());
    }

    #[test]
    fn test_uncorrelated_timing_not_clustered() {
        let config = SybilConfig::default();
        let mut table = NeighborTable::new(16, 10_000, MotionLimits::default());
        for round in 0..5u64 {
            let t = round * 1_000;
            let _ = table.upsert_neighbor(&beacon("vehicle_1", 0.0, 0.0, t), t, t);
            let later = t + 500;
            let _ = table.upsert_neighbor(&beacon("vehicle_2", 0.0, 0.2, later), later, later);
        }

        assert!(config.cluster_mates(&table, "vehicle_1").is_empty());
    }
}
