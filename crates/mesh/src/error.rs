//! Error types for secure routing operations.
//!
//! Only local operations (`send_data`, `update_position`, `emit`) return
//! these. Inbound frames never surface an error: `receive_message` drops
//! them and reports a boolean.

use thiserror::Error;
use vanetsec_core::MovementRejection;
use vanetsec_crypto::AuthError;

/// Errors that can occur in routing operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// No neighbor or fresh route reaches the destination; a route request
    /// has been broadcast
    #[error("No route found to destination: {destination}")]
    NoRoute {
        /// Unreachable destination
        destination: String,
    },

    /// The chosen next hop is below the trust threshold
    #[error("Next hop {next_hop} is not trusted")]
    UntrustedNextHop {
        /// Refused next hop
        next_hop: String,
    },

    /// A node cannot address data to itself
    #[error("Invalid destination: {destination}")]
    InvalidDestination {
        /// Offending destination
        destination: String,
    },

    /// Own movement failed physical validation
    #[error("Movement rejected: {0}")]
    MovementRejected(#[from] MovementRejection),

    /// Signing or envelope encoding failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Routing payload encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for routing operations.
pub type MeshResult<T> = Result<T, MeshError>;
