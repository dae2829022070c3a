//! Core types shared by every layer of the network stack.

/// Declared identity of a simulated node.
///
/// Stable for the lifetime of the node and used as the key of every
/// per-sender table (replay window, neighbor table, trust records).
pub type NodeId = String;

/// Logical simulation time in milliseconds.
pub type Timestamp = u64;

/// Milliseconds per second.
pub const MILLIS_PER_SEC: f64 = 1000.0;

/// Factor converting metres per second to kilometres per hour.
pub const MPS_TO_KMH: f64 = 3.6;

/// Convert a duration in seconds to whole milliseconds, rounding to nearest.
pub fn secs_to_millis(secs: f64) -> Timestamp {
    (secs * MILLIS_PER_SEC).round().max(0.0) as Timestamp
}

/// Convert a millisecond duration to fractional seconds.
pub fn millis_to_secs(millis: Timestamp) -> f64 {
    millis as f64 / MILLIS_PER_SEC
}

/// Elapsed milliseconds between two timestamps, zero if `later` is earlier.
pub fn age(now: Timestamp, then: Timestamp) -> Timestamp {
    now.saturating_sub(then)
}
