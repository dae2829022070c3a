//! Route Table - flat destination to next-hop lookup
//!
//! Entries come from accepted route replies. There is no cost comparison:
//! a valid entry always overwrites whatever was stored for its destination
//! (last writer wins), which keeps the table current in fast-changing
//! topologies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vanetsec_core::{age, NodeId, Timestamp};

/// Route entry in the routing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Destination node ID
    pub destination: NodeId,
    /// Next hop node ID
    pub next_hop: NodeId,
    /// Number of hops to destination
    pub hop_count: u8,
    /// Time the advertising reply was sent
    pub timestamp: Timestamp,
    /// Trust in the next hop when the entry was installed
    pub trust_score: f64,
}

/// Bounded, time-evicted routing table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<NodeId, RouteEntry>,
    capacity: usize,
    timeout_ms: Timestamp,
    max_hop_count: u8,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new(capacity: usize, timeout_ms: Timestamp, max_hop_count: u8) -> Self {
        Self {
            routes: HashMap::new(),
            capacity: capacity.max(1),
            timeout_ms,
            max_hop_count,
        }
    }

    /// Install a route unless its hop count reaches the ceiling or it is
    /// already expired at `now`. Returns whether the entry was stored.
    pub fn upsert_route(&mut self, destination: &str, entry: RouteEntry, now: Timestamp) -> bool {
        if entry.hop_count >= self.max_hop_count {
            return false;
        }
        if age(now, entry.timestamp) > self.timeout_ms {
            return false;
        }

        if self.routes.len() >= self.capacity && !self.routes.contains_key(destination) {
            self.evict_oldest();
        }
        self.routes.insert(destination.to_string(), entry);
        true
    }

    /// Fresh route to `destination`, if any.
    pub fn lookup(&self, destination: &str, now: Timestamp) -> Option<&RouteEntry> {
        self.routes
            .get(destination)
            .filter(|route| age(now, route.timestamp) <= self.timeout_ms)
    }

    /// Drop the route to `destination`.
    pub fn invalidate_route(&mut self, destination: &str) -> Option<RouteEntry> {
        self.routes.remove(destination)
    }

    /// Drop the route to `destination` only if it goes through `next_hop`.
    pub fn invalidate_via(&mut self, destination: &str, next_hop: &str) -> bool {
        match self.routes.get(destination) {
            Some(route) if route.next_hop == next_hop => {
                self.routes.remove(destination);
                true
            }
            _ => false,
        }
    }

    /// Remove entries older than the route timeout. Returns how many.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let initial_count = self.routes.len();
        let timeout_ms = self.timeout_ms;
        self.routes
            .retain(|_, route| age(now, route.timestamp) <= timeout_ms);
        initial_count - self.routes.len()
    }

    /// Iterate over stored routes.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values()
    }

    /// Number of stored routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Hop-count ceiling (exclusive).
    pub fn max_hop_count(&self) -> u8 {
        self.max_hop_count
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .routes
            .values()
            .min_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| b.destination.cmp(&a.destination))
            })
            .map(|route| route.destination.clone());
        if let Some(destination) = oldest {
            self.routes.remove(&destination);
        }
    }
}
