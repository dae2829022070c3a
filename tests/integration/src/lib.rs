//! Cross-crate scenario tests for the secure VANET stack
//!
//! This test suite validates:
//! - Replay, tampering and credential checks between live routers
//! - Trust movement driven by beacons, relays and heuristics
//! - Adversary models against honest fleets
//! - End-to-end simulation runs, statistics and configuration loading

pub mod test_utils;

#[cfg(test)]
mod replay_attack_tests;

#[cfg(test)]
mod trust_mesh_tests;

#[cfg(test)]
mod adversary_tests;

#[cfg(test)]
mod simulation_tests;
