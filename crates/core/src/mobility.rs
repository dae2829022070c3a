//! Position and mobility model.
//!
//! Every position a node adopts, and every position a neighbor reports,
//! passes through [`MotionLimits::validate_and_apply`]. The check is pure:
//! the same `(current, candidate)` pair always yields the same decision,
//! which keeps runs reproducible and makes it usable both for a node's own
//! movement and for judging a neighbor's claimed movement.
//!
//! # Physics Constraints
//!
//! - **Temporal**: the candidate timestamp must be strictly later
//! - **Speed**: measured speed (distance / elapsed) must not exceed the cap
//! - **Acceleration**: the change of measured speed relative to the
//!   current state's speed, divided by elapsed time, must not exceed the cap

use crate::types::{millis_to_secs, Timestamp, MPS_TO_KMH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum plausible vehicle speed (km/h).
pub const DEFAULT_MAX_SPEED_KMH: f64 = 200.0;

/// Default maximum plausible acceleration (m/s²).
pub const DEFAULT_MAX_ACCELERATION_MPS2: f64 = 10.0;

/// A point in space (metres) stamped with the logical time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: Timestamp,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64, timestamp: Timestamp) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Euclidean distance in 3D.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Euclidean distance in the ground plane.
    pub fn planar_distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A position together with the speed the node was last measured at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub position: Position,
    /// Last measured speed in m/s
    pub speed_mps: f64,
}

impl MotionState {
    pub fn new(position: Position, speed_mps: f64) -> Self {
        Self {
            position,
            speed_mps,
        }
    }
}

/// Reasons a candidate position is physically implausible.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MovementRejection {
    #[error("Temporal violation: candidate timestamp {candidate} is not after {current}")]
    NonMonotonic {
        current: Timestamp,
        candidate: Timestamp,
    },

    #[error("Speed violation: {speed_kmh:.2} km/h exceeds {max_speed_kmh:.2} km/h")]
    SpeedExceeded { speed_kmh: f64, max_speed_kmh: f64 },

    #[error("Acceleration violation: {acceleration_mps2:.2} m/s² exceeds {max_acceleration_mps2:.2} m/s²")]
    AccelerationExceeded {
        acceleration_mps2: f64,
        max_acceleration_mps2: f64,
    },
}

/// Physical bounds a movement must respect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    pub max_speed_kmh: f64,
    pub max_acceleration_mps2: f64,
    /// Side length of a toroidal area. When set, displacement uses the
    /// minimum-image convention so wrapping at an edge is not a jump.
    pub wrap_extent: Option<f64>,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            max_speed_kmh: DEFAULT_MAX_SPEED_KMH,
            max_acceleration_mps2: DEFAULT_MAX_ACCELERATION_MPS2,
            wrap_extent: None,
        }
    }
}

impl MotionLimits {
    pub fn with_wrap_extent(mut self, extent: f64) -> Self {
        self.wrap_extent = Some(extent);
        self
    }

    /// Displacement between two positions, honoring the wrap extent.
    pub fn displacement(&self, from: &Position, to: &Position) -> f64 {
        let wrap = |delta: f64| match self.wrap_extent {
            Some(extent) if extent > 0.0 => {
                let d = delta.rem_euclid(extent);
                d.min(extent - d)
            }
            _ => delta.abs(),
        };
        let dx = wrap(to.x - from.x);
        let dy = wrap(to.y - from.y);
        let dz = to.z - from.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Check a candidate against the current state and return the measured
    /// speed in m/s if the movement is plausible.
    pub fn check(
        &self,
        current: &MotionState,
        candidate: &Position,
    ) -> Result<f64, MovementRejection> {
        if candidate.timestamp <= current.position.timestamp {
            return Err(MovementRejection::NonMonotonic {
                current: current.position.timestamp,
                candidate: candidate.timestamp,
            });
        }

        let elapsed_s = millis_to_secs(candidate.timestamp - current.position.timestamp);
        let speed_mps = self.displacement(&current.position, candidate) / elapsed_s;

        let speed_kmh = speed_mps * MPS_TO_KMH;
        if speed_kmh > self.max_speed_kmh {
            return Err(MovementRejection::SpeedExceeded {
                speed_kmh,
                max_speed_kmh: self.max_speed_kmh,
            });
        }

        let acceleration_mps2 = (speed_mps - current.speed_mps).abs() / elapsed_s;
        if acceleration_mps2 > self.max_acceleration_mps2 {
            return Err(MovementRejection::AccelerationExceeded {
                acceleration_mps2,
                max_acceleration_mps2: self.max_acceleration_mps2,
            });
        }

        Ok(speed_mps)
    }

    /// Validate a movement and produce the state the node moves into.
    ///
    /// On rejection the caller keeps `current` untouched.
    pub fn validate_and_apply(
        &self,
        current: &MotionState,
        candidate: Position,
    ) -> Result<MotionState, MovementRejection> {
        let speed_mps = self.check(current, &candidate)?;
        Ok(MotionState::new(candidate, speed_mps))
    }

    /// Convenience predicate over [`MotionLimits::check`].
    pub fn is_plausible(&self, current: &MotionState, candidate: &Position) -> bool {
        self.check(current, candidate).is_ok()
    }
}
