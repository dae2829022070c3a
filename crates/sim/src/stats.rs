//! Simulation statistics.
//!
//! One [`TickStats`] sample is recorded per tick. Counters in a sample
//! cover that tick only; the delivery ratio is cumulative and is always
//! recomputed from the integer totals, never accumulated as a float.

use serde::{Deserialize, Serialize};
use vanetsec_core::{NodeId, Position, Timestamp};

/// Counters and scores for a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    pub tick: u64,
    pub time_ms: Timestamp,
    /// Link-level deliveries attempted (frame × in-range receiver)
    pub messages_sent: u64,
    /// Deliveries the receiver accepted
    pub messages_received: u64,
    pub attacks_attempted: u64,
    pub attacks_detected: u64,
    /// Data packets that reached their destination
    pub data_delivered: u64,
    /// Cumulative received / cumulative sent
    pub packet_delivery_ratio: f64,
    /// Mean over every ordered pair of distinct vehicles
    pub mean_trust_score: f64,
}

/// Time series of [`TickStats`] plus running totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    samples: Vec<TickStats>,
    total_sent: u64,
    total_received: u64,
    total_attacks_attempted: u64,
    total_attacks_detected: u64,
}

/// Per-tick counters before the derived ratios are filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounters {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub attacks_attempted: u64,
    pub attacks_detected: u64,
    pub data_delivered: u64,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample for `tick` and return it.
    pub fn record(
        &mut self,
        tick: u64,
        time_ms: Timestamp,
        counters: TickCounters,
        mean_trust_score: f64,
    ) -> &TickStats {
        self.total_sent += counters.messages_sent;
        self.total_received += counters.messages_received;
        self.total_attacks_attempted += counters.attacks_attempted;
        self.total_attacks_detected += counters.attacks_detected;

        let sample = TickStats {
            tick,
            time_ms,
            messages_sent: counters.messages_sent,
            messages_received: counters.messages_received,
            attacks_attempted: counters.attacks_attempted,
            attacks_detected: counters.attacks_detected,
            data_delivered: counters.data_delivered,
            packet_delivery_ratio: self.packet_delivery_ratio(),
            mean_trust_score,
        };
        self.samples.push(sample);
        &self.samples[self.samples.len() - 1]
    }

    /// Cumulative received / sent, `0.0` before anything was sent.
    pub fn packet_delivery_ratio(&self) -> f64 {
        if self.total_sent == 0 {
            0.0
        } else {
            self.total_received as f64 / self.total_sent as f64
        }
    }

    pub fn samples(&self) -> &[TickStats] {
        &self.samples
    }

    pub fn last(&self) -> Option<&TickStats> {
        self.samples.last()
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    pub fn total_attacks_attempted(&self) -> u64 {
        self.total_attacks_attempted
    }

    pub fn total_attacks_detected(&self) -> u64 {
        self.total_attacks_detected
    }

    pub fn messages_sent(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.messages_sent).collect()
    }

    pub fn messages_received(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.messages_received).collect()
    }

    pub fn attacks_attempted(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.attacks_attempted).collect()
    }

    pub fn attacks_detected(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.attacks_detected).collect()
    }

    pub fn packet_delivery_ratios(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.packet_delivery_ratio).collect()
    }

    pub fn mean_trust_scores(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.mean_trust_score).collect()
    }

    /// Lowest mean trust seen in any tick.
    pub fn min_mean_trust(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.mean_trust_score)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Where a vehicle is, for visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub position: Position,
    pub is_malicious: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(sent: u64, received: u64) -> TickCounters {
        TickCounters {
            messages_sent: sent,
            messages_received: received,
            ..TickCounters::default()
        }
    }

    #[test]
    fn test_empty_ratio_is_zero() {
        let mut stats = SimulationStats::new();
        assert_eq!(stats.packet_delivery_ratio(), 0.0);
        let sample = stats.record(1, 100, counters(0, 0), 1.0);
        assert_eq!(sample.packet_delivery_ratio, 0.0);
    }

    #[test]
    fn test_ratio_is_cumulative() {
        let mut stats = SimulationStats::new();
        stats.record(1, 100, counters(4, 4), 1.0);
        stats.record(2, 200, counters(6, 2), 1.0);

        assert_eq!(stats.total_sent(), 10);
        assert_eq!(stats.total_received(), 6);
        assert_eq!(stats.last().unwrap().packet_delivery_ratio, 0.6);
        assert_eq!(stats.packet_delivery_ratios(), vec![1.0, 0.6]);
        assert_eq!(stats.messages_sent(), vec![4, 6]);
    }

    #[test]
    fn test_min_mean_trust() {
        let mut stats = SimulationStats::new();
        assert!(stats.min_mean_trust().is_none());
        stats.record(1, 100, counters(1, 1), 0.95);
        stats.record(2, 200, counters(1, 1), 0.91);
        stats.record(3, 300, counters(1, 1), 0.99);
        assert_eq!(stats.min_mean_trust(), Some(0.91));
    }
}
