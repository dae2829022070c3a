//! Trust Mesh
//!
//! Per-node trust bookkeeping for the secure routing layer:
//! - EMA trust scores with heuristic penalties
//! - Forwarding evidence for black-hole detection
//!
//! Nothing here is shared between nodes. Each router owns one
//! [`TrustEngine`] and one [`ForwardingLedger`].

pub mod forwarding;
pub mod trust;

pub use forwarding::{
    ForwardingConfig, ForwardingLedger, ForwardingOutcome, ForwardingRecord, PacketKey,
};
pub use trust::{
    Suspicion, TrustConfig, TrustEngine, TrustLevel, DEFAULT_TRUST_THRESHOLD, HEALTHY_THRESHOLD,
    MAX_TRUST, MIN_TRUST,
};
