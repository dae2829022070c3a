//! Tick-driven simulation of a secure vehicular ad-hoc network.
//!
//! Vehicles move on a toroidal square area, exchange signed beacons, and
//! route application data over range-limited links. A configurable share
//! of vehicles run an adversary model. [`Simulation`] records per-tick
//! counters and the network-wide mean trust into [`SimulationStats`].
//!
//! ```rust
//! use vanetsec_core::{Config, SimulationConfig};
//! use vanetsec_sim::Simulation;
//!
//! let config = Config {
//!     simulation: SimulationConfig {
//!         num_vehicles: 5,
//!         num_malicious: 1,
//!         sim_time_secs: 2.0,
//!         ..SimulationConfig::default()
//!     },
//!     ..Config::default()
//! };
//! let mut sim = Simulation::new(config).unwrap();
//! let stats = sim.run();
//! assert_eq!(stats.samples().len(), 20);
//! ```

pub mod adversary;
pub mod error;
pub mod scheduler;
pub mod stats;
pub mod vehicle;

pub use adversary::{Adversary, BlackHole, CAPTURE_CAPACITY, SYBIL_OFFSET_M};
pub use error::{SimError, SimResult};
pub use scheduler::{Placement, Simulation};
pub use stats::{NodeSnapshot, SimulationStats, TickCounters, TickStats};
pub use vehicle::{sybil_id, vehicle_id, Kinematics, Vehicle};
