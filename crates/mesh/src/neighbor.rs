//! Neighbor Table
//!
//! Last-known state of every node heard from directly. Entries are
//! created and refreshed by authenticated beacons and evicted once a
//! neighbor has been silent longer than the neighbor timeout.
//!
//! A reported position is adopted only if it is a plausible move from the
//! neighbor's last known state. An implausible report still refreshes the
//! entry (the neighbor is alive) but marks it position-inconsistent.

use crate::message::Beacon;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use vanetsec_core::{age, MotionLimits, MotionState, MovementRejection, NodeId, Position, Timestamp};
use vanetsec_core::types::MPS_TO_KMH;

/// Beacon samples kept per neighbor for correlation checks.
pub const SAMPLE_HISTORY: usize = 5;

/// One reported position and the envelope time it was sent at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeaconSample {
    /// Position as claimed, adopted or not
    pub position: Position,
    /// Envelope timestamp of the beacon
    pub sent_at: Timestamp,
}

/// Last known state of a neighbor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborEntry {
    /// Neighbor identity
    pub id: NodeId,
    /// Last accepted position and measured speed
    pub motion: MotionState,
    /// Last reported speed in km/h
    pub speed_kmh: f64,
    /// Last reported heading in radians
    pub heading: f64,
    /// Receiver clock at the last beacon
    pub last_seen: Timestamp,
    /// Whether the latest reported position passed validation
    pub position_consistent: bool,
    samples: VecDeque<BeaconSample>,
}

impl NeighborEntry {
    fn from_beacon(beacon: &Beacon, sent_at: Timestamp, now: Timestamp) -> Self {
        let mut samples = VecDeque::with_capacity(SAMPLE_HISTORY);
        samples.push_back(BeaconSample {
            position: beacon.position,
            sent_at,
        });
        Self {
            id: beacon.id.clone(),
            motion: MotionState::new(beacon.position, beacon.speed_kmh / MPS_TO_KMH),
            speed_kmh: beacon.speed_kmh,
            heading: beacon.heading,
            last_seen: now,
            position_consistent: true,
            samples,
        }
    }

    /// Recent claimed positions, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &BeaconSample> {
        self.samples.iter()
    }

    fn push_sample(&mut self, sample: BeaconSample) {
        self.samples.push_back(sample);
        while self.samples.len() > SAMPLE_HISTORY {
            self.samples.pop_front();
        }
    }
}

/// Bounded, time-evicted neighbor table.
#[derive(Debug, Clone)]
pub struct NeighborTable {
    entries: HashMap<NodeId, NeighborEntry>,
    capacity: usize,
    timeout_ms: Timestamp,
    limits: MotionLimits,
}

impl NeighborTable {
    /// Create an empty table.
    pub fn new(capacity: usize, timeout_ms: Timestamp, limits: MotionLimits) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            timeout_ms,
            limits,
        }
    }

    /// Insert or refresh a neighbor from a beacon sent at `sent_at`.
    ///
    /// Returns the rejection when the reported position is not a plausible
    /// move from the stored state. The entry is refreshed either way.
    pub fn upsert_neighbor(
        &mut self,
        beacon: &Beacon,
        sent_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), MovementRejection> {
        let sample = BeaconSample {
            position: beacon.position,
            sent_at,
        };

        let Some(entry) = self.entries.get_mut(&beacon.id) else {
            if self.entries.len() >= self.capacity {
                self.evict_stalest();
            }
            self.entries.insert(
                beacon.id.clone(),
                NeighborEntry::from_beacon(beacon, sent_at, now),
            );
            return Ok(());
        };

        entry.last_seen = now;
        entry.speed_kmh = beacon.speed_kmh;
        entry.heading = beacon.heading;
        entry.push_sample(sample);

        match self.limits.validate_and_apply(&entry.motion, beacon.position) {
            Ok(motion) => {
                entry.motion = motion;
                entry.position_consistent = true;
                Ok(())
            }
            Err(rejection) => {
                entry.position_consistent = false;
                Err(rejection)
            }
        }
    }

    /// Look up a neighbor.
    pub fn get(&self, id: &str) -> Option<&NeighborEntry> {
        self.entries.get(id)
    }

    /// Whether `id` is currently a neighbor.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether `id` was heard within the neighbor timeout.
    pub fn is_fresh(&self, id: &str, now: Timestamp) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| age(now, entry.last_seen) <= self.timeout_ms)
    }

    /// Iterate over every entry.
    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict neighbors silent for longer than the timeout. Returns the
    /// evicted ids in sorted order.
    pub fn prune(&mut self, now: Timestamp) -> Vec<NodeId> {
        let timeout_ms = self.timeout_ms;
        let mut evicted: Vec<NodeId> = self
            .entries
            .iter()
            .filter(|(_, entry)| age(now, entry.last_seen) > timeout_ms)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &evicted {
            self.entries.remove(id);
        }
        evicted.sort();
        evicted
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .entries
            .values()
            .min_by(|a, b| a.last_seen.cmp(&b.last_seen).then_with(|| b.id.cmp(&a.id)))
            .map(|entry| entry.id.clone());
        if let Some(id) = stalest {
            self.entries.remove(&id);
        }
    }
}
