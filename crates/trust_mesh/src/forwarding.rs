//! Forwarding Ledger Module
//!
//! Per-observer evidence about whether neighbors actually relay the traffic
//! they attract. A black hole advertises short routes to many destinations
//! and then drops what it receives, so the ledger tracks both sides:
//!
//! - **Advertisements**: distinct destinations a subject has claimed a
//!   route of at most one hop to
//! - **Hand-offs**: data packets given to the subject for relaying, each
//!   armed with a watchdog deadline
//! - **Outcomes**: a hand-off is confirmed when the observer overhears the
//!   subject relay it, and failed when the watchdog expires first
//!
//! A hand-off released by a route error is resolved without counting either
//! way: the subject reported that it could not forward.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use vanetsec_core::{NodeId, ProtocolConfig, Timestamp};

/// Identity of one data packet: originator and its per-origin sequence.
pub type PacketKey = (NodeId, u64);

/// Thresholds for the black-hole heuristic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    pub watchdog_timeout_ms: Timestamp,
    /// Distinct short-route advertisements before a subject can be flagged
    pub min_advertised: usize,
    /// Resolved hand-offs before a success rate is meaningful
    pub min_handoffs: u64,
    /// Success rate below which a subject is flagged
    pub max_success_rate: f64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: 2_000,
            min_advertised: 3,
            min_handoffs: 2,
            max_success_rate: 0.5,
        }
    }
}

impl From<&ProtocolConfig> for ForwardingConfig {
    fn from(protocol: &ProtocolConfig) -> Self {
        Self {
            watchdog_timeout_ms: protocol.watchdog_timeout_ms(),
            min_advertised: protocol.blackhole_min_advertised,
            min_handoffs: protocol.blackhole_min_handoffs,
            max_success_rate: protocol.blackhole_max_success_rate,
        }
    }
}

/// Outcome of a watched hand-off, reported back to the trust engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingOutcome {
    Relayed { subject: NodeId, packet: PacketKey },
    Dropped { subject: NodeId, packet: PacketKey },
}

#[derive(Debug, Clone)]
struct PendingHandoff {
    packet: PacketKey,
    destination: NodeId,
    deadline: Timestamp,
}

/// Counters for one subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardingRecord {
    pub advertised: HashSet<NodeId>,
    pub confirmed: u64,
    pub failed: u64,
    #[serde(skip)]
    pending: Vec<PendingHandoff>,
}

impl ForwardingRecord {
    pub fn resolved(&self) -> u64 {
        self.confirmed + self.failed
    }

    /// Confirmed share of resolved hand-offs, `None` before any resolved.
    pub fn success_rate(&self) -> Option<f64> {
        match self.resolved() {
            0 => None,
            resolved => Some(self.confirmed as f64 / resolved as f64),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForwardingLedger {
    records: HashMap<NodeId, ForwardingRecord>,
    config: ForwardingConfig,
}

impl ForwardingLedger {
    pub fn new(config: ForwardingConfig) -> Self {
        Self {
            records: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &ForwardingConfig {
        &self.config
    }

    pub fn record(&self, subject: &str) -> Option<&ForwardingRecord> {
        self.records.get(subject)
    }

    /// Note that `subject` claimed a route of `hop_count` hops to
    /// `destination`. Only short routes to third parties count.
    pub fn record_advertisement(&mut self, subject: &str, destination: &str, hop_count: u8) {
        if hop_count > 1 || subject == destination {
            return;
        }
        self.records
            .entry(subject.to_string())
            .or_default()
            .advertised
            .insert(destination.to_string());
    }

    /// Arm a watchdog for a packet handed to `subject` for relaying.
    pub fn record_handoff(
        &mut self,
        subject: &str,
        packet: PacketKey,
        destination: &str,
        now: Timestamp,
    ) {
        let deadline = now.saturating_add(self.config.watchdog_timeout_ms);
        let record = self.records.entry(subject.to_string()).or_default();
        if record.pending.iter().any(|pending| pending.packet == packet) {
            return;
        }
        record.pending.push(PendingHandoff {
            packet,
            destination: destination.to_string(),
            deadline,
        });
    }

    /// The observer overheard `subject` relaying `packet`.
    pub fn confirm(&mut self, subject: &str, packet: &PacketKey) -> Option<ForwardingOutcome> {
        let record = self.records.get_mut(subject)?;
        let index = record
            .pending
            .iter()
            .position(|pending| &pending.packet == packet)?;
        record.pending.swap_remove(index);
        record.confirmed += 1;
        Some(ForwardingOutcome::Relayed {
            subject: subject.to_string(),
            packet: packet.clone(),
        })
    }

    /// Release every pending hand-off to `subject` for `destination`.
    /// Returns how many were released.
    pub fn release(&mut self, subject: &str, destination: &str) -> usize {
        let Some(record) = self.records.get_mut(subject) else {
            return 0;
        };
        let before = record.pending.len();
        record
            .pending
            .retain(|pending| pending.destination != destination);
        let released = before - record.pending.len();
        if released > 0 {
            debug!(subject = %subject, destination = %destination, released, "Hand-offs released");
        }
        released
    }

    /// Fail every hand-off whose deadline has passed.
    pub fn expire(&mut self, now: Timestamp) -> Vec<ForwardingOutcome> {
        let mut outcomes = Vec::new();
        for (subject, record) in self.records.iter_mut() {
            let mut kept = Vec::with_capacity(record.pending.len());
            for pending in record.pending.drain(..) {
                if now >= pending.deadline {
                    record.failed += 1;
                    outcomes.push(ForwardingOutcome::Dropped {
                        subject: subject.clone(),
                        packet: pending.packet,
                    });
                } else {
                    kept.push(pending);
                }
            }
            record.pending = kept;
        }
        // Iteration order of the map is not stable across runs
        outcomes.sort_by(|a, b| outcome_key(a).cmp(&outcome_key(b)));
        outcomes
    }

    /// A subject is a black-hole suspect once it has advertised enough
    /// short routes, enough hand-offs have resolved, and too few of them
    /// were relayed.
    pub fn is_black_hole_suspect(&self, subject: &str) -> bool {
        let Some(record) = self.records.get(subject) else {
            return false;
        };
        if record.advertised.len() < self.config.min_advertised
            || record.resolved() < self.config.min_handoffs
        {
            return false;
        }
        record
            .success_rate()
            .is_some_and(|rate| rate < self.config.max_success_rate)
    }

    pub fn suspects(&self) -> Vec<NodeId> {
        let mut suspects: Vec<NodeId> = self
            .records
            .keys()
            .filter(|subject| self.is_black_hole_suspect(subject))
            .cloned()
            .collect();
        suspects.sort();
        suspects
    }
}

fn outcome_key(outcome: &ForwardingOutcome) -> (&str, &str, u64) {
    match outcome {
        ForwardingOutcome::Relayed { subject, packet }
        | ForwardingOutcome::Dropped { subject, packet } => {
            (subject.as_str(), packet.0.as_str(), packet.1)
        }
    }
}
