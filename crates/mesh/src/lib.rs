//! Secure Mesh - trust-gated routing for vehicular ad-hoc networks
//!
//! Implements the per-node protocol stack for a range-limited broadcast
//! medium where any neighbor may be hostile.
//!
//! # Core Components
//!
//! - **Wire Messages**: HELLO, ROUTE_REQUEST, ROUTE_REPLY, ROUTE_ERROR and
//!   DATA, carried inside signed envelopes
//! - **Neighbor Table**: last-known kinematic state per neighbor with
//!   physical plausibility checks
//! - **Route Table**: flat destination to next-hop lookup with hop ceiling
//!   and expiry
//! - **Sybil Heuristic**: spatial and temporal correlation of beacons
//! - **Secure Router**: the per-node state machine tying it all together
//!
//! # Design Principles
//!
//! 1. **Fail-Closed**: unauthenticated or malformed frames are dropped
//! 2. **Local Trust**: every trust decision is the observer's own
//! 3. **Logical Time**: every age comparison uses the caller's clock
//!
//! # Example Usage
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use vanetsec_core::{MotionState, Position};
//! use vanetsec_crypto::{AuthenticatorConfig, MessageAuthenticator};
//! use vanetsec_mesh::{RouterConfig, SecureRouter};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let mut auth = MessageAuthenticator::new("vehicle_0", AuthenticatorConfig::default(), &mut rng);
//! auth.issue_certificate(0);
//!
//! let start = MotionState::new(Position::new(0.0, 0.0, 0.0, 0), 0.0);
//! let mut router = SecureRouter::new(auth, start, RouterConfig::default());
//! router.send_beacon(100).unwrap();
//! assert_eq!(router.drain_outbox().len(), 1);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod neighbor;
pub mod protocol;
pub mod routing;
pub mod sybil;

// Re-export main types
pub use error::{MeshError, MeshResult};
pub use message::{Beacon, DataPacket, MessageKind, RoutingMessage};
pub use neighbor::{BeaconSample, NeighborEntry, NeighborTable, SAMPLE_HISTORY};
pub use protocol::{
    HonestBehavior, RouterConfig, RouterMetrics, RouterState, RoutingBehavior, SecureRouter,
};
pub use routing::{RouteEntry, RouteTable};
pub use sybil::SybilConfig;
