//! Trust Scoring Module
//!
//! Each node runs its own [`TrustEngine`]: trust is always the observer's
//! belief about a subject, never a global value. Records are created lazily
//! at the initial score (fully trusted) and move by exponential moving
//! average toward observed outcomes. Heuristic verdicts are applied as
//! multiplicative penalties when a score is read, not folded into the EMA.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;
use vanetsec_core::{NodeId, ProtocolConfig};

/// Lowest possible trust score.
pub const MIN_TRUST: f64 = 0.0;

/// Highest possible trust score.
pub const MAX_TRUST: f64 = 1.0;

/// Score at or above which a node is `Healthy`.
pub const HEALTHY_THRESHOLD: f64 = 0.9;

/// Default score below which a node is not used as a next hop.
pub const DEFAULT_TRUST_THRESHOLD: f64 = 0.5;

/// Trust computation constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Weight of the newest observation in the EMA
    pub alpha: f64,
    /// Score assigned on first contact
    pub initial_score: f64,
    /// Minimum score for `is_trusted`
    pub threshold: f64,
    /// Multiplier applied per failed heuristic
    pub penalty_factor: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            initial_score: MAX_TRUST,
            threshold: DEFAULT_TRUST_THRESHOLD,
            penalty_factor: 0.5,
        }
    }
}

impl From<&ProtocolConfig> for TrustConfig {
    fn from(protocol: &ProtocolConfig) -> Self {
        Self {
            alpha: protocol.trust_alpha,
            initial_score: MAX_TRUST,
            threshold: protocol.trust_threshold,
            penalty_factor: protocol.trust_penalty_factor,
        }
    }
}

/// Trust level thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    Healthy,     // Trust score >= 0.9
    Suspect,     // Trust score >= threshold
    Quarantined, // Trust score < threshold
}

/// Heuristic verdicts about a subject at the time its score is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspicion {
    pub black_hole: bool,
    pub sybil: bool,
    pub position_falsified: bool,
}

impl Suspicion {
    pub const NONE: Suspicion = Suspicion {
        black_hole: false,
        sybil: false,
        position_falsified: false,
    };

    pub fn any(&self) -> bool {
        self.black_hole || self.sybil || self.position_falsified
    }

    /// Combined multiplier: one penalty for behavioral flags (black-hole or
    /// Sybil), one for position inconsistency. The two compound.
    pub fn multiplier(&self, penalty_factor: f64) -> f64 {
        let mut multiplier = 1.0;
        if self.black_hole || self.sybil {
            multiplier *= penalty_factor;
        }
        if self.position_falsified {
            multiplier *= penalty_factor;
        }
        multiplier
    }
}

/// One observer's trust records.
#[derive(Debug, Clone)]
pub struct TrustEngine {
    records: HashMap<NodeId, f64>,
    config: TrustConfig,
}

impl TrustEngine {
    pub fn new() -> Self {
        Self::with_config(TrustConfig::default())
    }

    pub fn with_config(config: TrustConfig) -> Self {
        Self {
            records: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Stored EMA value for a subject, if one exists.
    pub fn record(&self, subject: &str) -> Option<f64> {
        self.records.get(subject).copied()
    }

    /// Fold an observed outcome in `[0, 1]` into the subject's EMA.
    ///
    /// `new = alpha * observed + (1 - alpha) * old`, with `old` defaulting
    /// to the initial score on first contact. Returns the stored value.
    pub fn update(&mut self, subject: &str, observed: f64) -> f64 {
        let observed = observed.clamp(MIN_TRUST, MAX_TRUST);
        let alpha = self.config.alpha;
        let initial = self.config.initial_score;
        let record = self
            .records
            .entry(subject.to_string())
            .or_insert(initial);
        // Same as alpha * observed + (1 - alpha) * old, but exact when they agree
        *record = (*record + alpha * (observed - *record)).clamp(MIN_TRUST, MAX_TRUST);
        trace!(subject = %subject, observed, score = *record, "Trust updated");
        *record
    }

    /// Effective score: EMA (or initial score) times heuristic penalties,
    /// clamped to `[MIN_TRUST, MAX_TRUST]`.
    pub fn score(&self, subject: &str, suspicion: Suspicion) -> f64 {
        let base = self
            .records
            .get(subject)
            .copied()
            .unwrap_or(self.config.initial_score);
        (base * suspicion.multiplier(self.config.penalty_factor)).clamp(MIN_TRUST, MAX_TRUST)
    }

    pub fn is_trusted(&self, subject: &str, suspicion: Suspicion) -> bool {
        self.score(subject, suspicion) >= self.config.threshold
    }

    pub fn level(&self, score: f64) -> TrustLevel {
        if score >= HEALTHY_THRESHOLD {
            TrustLevel::Healthy
        } else if score >= self.config.threshold {
            TrustLevel::Suspect
        } else {
            TrustLevel::Quarantined
        }
    }

    /// Subjects with a stored record.
    pub fn subjects(&self) -> impl Iterator<Item = &NodeId> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for TrustEngine {
    fn default() -> Self {
        Self::new()
    }
}
