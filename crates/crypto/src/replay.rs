//! Replay detection window.
//!
//! Tracks, per sender, the `(timestamp, sequence, payload_hash)` of the most
//! recently accepted messages. The window is bounded: once a sender's
//! history reaches the configured depth the oldest entry is dropped. The
//! highest accepted sequence per sender is retained independently, so a
//! message that has already fallen out of the window is still rejected.

use crate::hashing::PayloadHash;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use vanetsec_core::{NodeId, Timestamp};

/// Default number of entries remembered per sender.
pub const DEFAULT_REPLAY_WINDOW_DEPTH: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Duplicate message: timestamp {timestamp}, sequence {sequence}")]
    Duplicate { timestamp: Timestamp, sequence: u64 },

    #[error("Sequence {sequence} not above last accepted {highest}")]
    SequenceRegression { sequence: u64, highest: u64 },
}

/// One accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEntry {
    pub timestamp: Timestamp,
    pub sequence: u64,
    pub payload_hash: PayloadHash,
}

#[derive(Debug, Default)]
struct SenderHistory {
    entries: VecDeque<ReplayEntry>,
    highest_sequence: u64,
}

/// Bounded per-sender replay window.
#[derive(Debug)]
pub struct ReplayWindow {
    depth: usize,
    senders: HashMap<NodeId, SenderHistory>,
}

impl ReplayWindow {
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            senders: HashMap::new(),
        }
    }

    /// Check whether a candidate would be a replay, without recording it.
    ///
    /// A candidate is a replay when its `(timestamp, sequence)` is already
    /// present, or when its sequence does not advance past the highest
    /// sequence accepted from that sender. The payload hash is kept for
    /// diagnostics only; identical payloads under new sequences are fresh.
    pub fn check(
        &self,
        sender: &str,
        timestamp: Timestamp,
        sequence: u64,
        _payload_hash: &PayloadHash,
    ) -> Result<(), ReplayError> {
        let Some(history) = self.senders.get(sender) else {
            return Ok(());
        };

        let duplicate = history
            .entries
            .iter()
            .any(|entry| entry.timestamp == timestamp && entry.sequence == sequence);
        if duplicate {
            return Err(ReplayError::Duplicate {
                timestamp,
                sequence,
            });
        }

        if sequence <= history.highest_sequence {
            return Err(ReplayError::SequenceRegression {
                sequence,
                highest: history.highest_sequence,
            });
        }

        Ok(())
    }

    /// Record an accepted message, evicting the oldest entry beyond depth.
    pub fn record(&mut self, sender: &str, entry: ReplayEntry) {
        let history = self.senders.entry(sender.to_string()).or_default();
        history.highest_sequence = history.highest_sequence.max(entry.sequence);
        history.entries.push_back(entry);
        while history.entries.len() > self.depth {
            history.entries.pop_front();
        }
    }

    /// Number of entries currently remembered for a sender.
    pub fn len(&self, sender: &str) -> usize {
        self.senders
            .get(sender)
            .map(|history| history.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.senders.values().all(|history| history.entries.is_empty())
    }

    pub fn contains(&self, sender: &str, timestamp: Timestamp, sequence: u64) -> bool {
        self.senders.get(sender).is_some_and(|history| {
            history
                .entries
                .iter()
                .any(|entry| entry.timestamp == timestamp && entry.sequence == sequence)
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_WINDOW_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: Timestamp, sequence: u64, tag: u8) -> ReplayEntry {
        ReplayEntry {
            timestamp,
            sequence,
            payload_hash: [tag; 32],
        }
    }

    #[test]
    fn test_unknown_sender_passes() {
        let window = ReplayWindow::default();
        assert!(window.check("vehicle_1", 100, 1, &[0u8; 32]).is_ok());
        assert!(window.is_empty());
    }

    #[test]
    fn test_duplicate_rejected_regardless_of_payload() {
        let mut window = ReplayWindow::default();
        window.record("vehicle_1", entry(100, 1, 0xAA));

        let result = window.check("vehicle_1", 100, 1, &[0xBB; 32]);
        assert!(matches!(result, Err(ReplayError::Duplicate { .. })));
    }

    #[test]
    fn test_same_payload_new_sequence_accepted() {
        let mut window = ReplayWindow::default();
        window.record("vehicle_1", entry(100, 1, 0xAA));

        assert!(window.check("vehicle_1", 100, 2, &[0xAA; 32]).is_ok());
        window.record("vehicle_1", entry(100, 2, 0xAA));
        assert_eq!(window.len("vehicle_1"), 2);
    }

    #[test]
    fn test_sequence_regression_rejected() {
        let mut window = ReplayWindow::default();
        window.record("vehicle_1", entry(100, 5, 1));

        assert!(matches!(
            window.check("vehicle_1", 200, 4, &[2u8; 32]),
            Err(ReplayError::SequenceRegression {
                sequence: 4,
                highest: 5
            })
        ));
        assert!(window.check("vehicle_1", 200, 6, &[2u8; 32]).is_ok());
    }

    #[test]
    fn test_senders_independent() {
        let mut window = ReplayWindow::default();
        window.record("vehicle_1", entry(100, 1, 1));

        assert!(window.check("vehicle_2", 100, 1, &[1u8; 32]).is_ok());
    }

    #[test]
    fn test_fifo_bound_keeps_sequence_floor() {
        let mut window = ReplayWindow::new(3);
        for seq in 1..=5 {
            window.record("vehicle_1", entry(seq * 100, seq, seq as u8));
        }

        assert_eq!(window.len("vehicle_1"), 3);
        assert!(!window.contains("vehicle_1", 100, 1));
        assert!(window.contains("vehicle_1", 500, 5));
        // Evicted but still below the sequence floor
        assert!(window.check("vehicle_1", 100, 1, &[1u8; 32]).is_err());
    }
}
