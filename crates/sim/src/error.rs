//! Errors raised while building a simulation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] vanetsec_core::Error),

    #[error("Expected {expected} placements, got {actual}")]
    PlacementCount { expected: usize, actual: usize },
}

pub type SimResult<T> = Result<T, SimError>;
