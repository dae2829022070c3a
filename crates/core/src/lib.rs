//! Core functionality for the secure vehicular ad-hoc network stack.
//!
//! This crate provides the shared types, the position and mobility model,
//! configuration, error types, and logging setup used by every other crate
//! in the workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod mobility;
pub mod types;

pub use config::{AdversaryConfig, Config, ProtocolConfig, SimulationConfig, TrafficConfig};
pub use error::{Error, Result};
pub use mobility::{
    MotionLimits, MotionState, MovementRejection, Position, DEFAULT_MAX_ACCELERATION_MPS2,
    DEFAULT_MAX_SPEED_KMH,
};
pub use types::{age, millis_to_secs, secs_to_millis, NodeId, Timestamp};
