//! Configuration management for the secure VANET stack.
//!
//! Every section deserializes with defaults, so a TOML file only needs to
//! name the values it overrides. [`Config::validate`] runs before any
//! simulation state is built.

use crate::error::{Error, Result};
use crate::mobility::{MotionLimits, DEFAULT_MAX_ACCELERATION_MPS2, DEFAULT_MAX_SPEED_KMH};
use crate::types::{secs_to_millis, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub protocol: ProtocolConfig,
}

/// Protocol constants for a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub max_speed_kmh: f64,
    pub max_acceleration_mps2: f64,
    pub route_timeout_secs: f64,
    pub neighbor_timeout_secs: f64,
    pub max_hop_count: u8,
    pub max_neighbors: usize,
    pub max_routes: usize,
    pub trust_alpha: f64,
    pub trust_threshold: f64,
    pub trust_penalty_factor: f64,
    pub freshness_tolerance_secs: f64,
    pub replay_window_depth: usize,
    pub watchdog_timeout_secs: f64,
    pub blackhole_min_advertised: usize,
    pub blackhole_min_handoffs: u64,
    pub blackhole_max_success_rate: f64,
    pub sybil_proximity_m: f64,
    pub sybil_min_samples: usize,
    pub sybil_timing_window_secs: f64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: DEFAULT_MAX_SPEED_KMH,
            max_acceleration_mps2: DEFAULT_MAX_ACCELERATION_MPS2,
            route_timeout_secs: 60.0,
            neighbor_timeout_secs: 10.0,
            max_hop_count: 10,
            max_neighbors: 256,
            max_routes: 512,
            trust_alpha: 0.3,
            trust_threshold: 0.5,
            trust_penalty_factor: 0.5,
            freshness_tolerance_secs: 5.0,
            replay_window_depth: 100,
            watchdog_timeout_secs: 2.0,
            blackhole_min_advertised: 3,
            blackhole_min_handoffs: 2,
            blackhole_max_success_rate: 0.5,
            sybil_proximity_m: 1.0,
            sybil_min_samples: 3,
            sybil_timing_window_secs: 0.2,
        }
    }
}

impl ProtocolConfig {
    pub fn route_timeout_ms(&self) -> Timestamp {
        secs_to_millis(self.route_timeout_secs)
    }

    pub fn neighbor_timeout_ms(&self) -> Timestamp {
        secs_to_millis(self.neighbor_timeout_secs)
    }

    pub fn freshness_tolerance_ms(&self) -> Timestamp {
        secs_to_millis(self.freshness_tolerance_secs)
    }

    pub fn watchdog_timeout_ms(&self) -> Timestamp {
        secs_to_millis(self.watchdog_timeout_secs)
    }

    pub fn sybil_timing_window_ms(&self) -> Timestamp {
        secs_to_millis(self.sybil_timing_window_secs)
    }

    /// Motion limits derived from the speed and acceleration caps.
    pub fn motion_limits(&self) -> MotionLimits {
        MotionLimits {
            max_speed_kmh: self.max_speed_kmh,
            max_acceleration_mps2: self.max_acceleration_mps2,
            wrap_extent: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        positive("protocol.max_speed_kmh", self.max_speed_kmh)?;
        positive("protocol.max_acceleration_mps2", self.max_acceleration_mps2)?;
        positive("protocol.route_timeout_secs", self.route_timeout_secs)?;
        positive("protocol.neighbor_timeout_secs", self.neighbor_timeout_secs)?;
        positive("protocol.freshness_tolerance_secs", self.freshness_tolerance_secs)?;
        positive("protocol.watchdog_timeout_secs", self.watchdog_timeout_secs)?;
        positive("protocol.sybil_proximity_m", self.sybil_proximity_m)?;
        positive("protocol.sybil_timing_window_secs", self.sybil_timing_window_secs)?;
        positive("protocol.trust_penalty_factor", self.trust_penalty_factor)?;

        if self.max_hop_count == 0 {
            return Err(Error::invalid("protocol.max_hop_count", "must be at least 1"));
        }
        if self.max_neighbors == 0 || self.max_routes == 0 || self.replay_window_depth == 0 {
            return Err(Error::invalid(
                "protocol.capacity",
                "table capacities and replay window depth must be at least 1",
            ));
        }
        if !(self.trust_alpha > 0.0 && self.trust_alpha <= 1.0) {
            return Err(Error::invalid(
                "protocol.trust_alpha",
                format!("must be in (0, 1], got {}", self.trust_alpha),
            ));
        }
        unit_interval("protocol.trust_threshold", self.trust_threshold)?;
        unit_interval("protocol.trust_penalty_factor", self.trust_penalty_factor)?;
        unit_interval(
            "protocol.blackhole_max_success_rate",
            self.blackhole_max_success_rate,
        )?;
        if self.sybil_min_samples == 0 {
            return Err(Error::invalid("protocol.sybil_min_samples", "must be at least 1"));
        }
        Ok(())
    }
}

/// Behavior rates for adversarial vehicles. All values are probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversaryConfig {
    /// Chance a beacon carries a fabricated position
    pub falsification_rate: f64,
    /// Chance a beacon (or an inbound frame) is silently dropped
    pub drop_rate: f64,
    /// Chance per tick of re-sending a captured frame verbatim
    pub replay_rate: f64,
    /// Chance per tick of re-sending a captured frame with a modified payload
    pub tamper_rate: f64,
    /// Answer every route request with a one-hop route and swallow relayed data
    pub black_hole: bool,
    /// Fabricated identities beaconing next to each adversary
    pub sybil_identities: usize,
}

impl Default for AdversaryConfig {
    fn default() -> Self {
        Self {
            falsification_rate: 0.5,
            drop_rate: 0.5,
            replay_rate: 0.1,
            tamper_rate: 0.1,
            black_hole: true,
            sybil_identities: 2,
        }
    }
}

impl AdversaryConfig {
    pub fn validate(&self) -> Result<()> {
        unit_interval("adversary.falsification_rate", self.falsification_rate)?;
        unit_interval("adversary.drop_rate", self.drop_rate)?;
        unit_interval("adversary.replay_rate", self.replay_rate)?;
        unit_interval("adversary.tamper_rate", self.tamper_rate)?;
        Ok(())
    }
}

/// Application traffic generated by honest vehicles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Chance per beacon interval that a vehicle originates a data packet
    pub data_rate: f64,
    /// Size of each generated payload in bytes
    pub payload_bytes: usize,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            data_rate: 0.2,
            payload_bytes: 64,
        }
    }
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_vehicles: usize,
    pub num_malicious: usize,
    pub sim_time_secs: f64,
    pub area_size: f64,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub beacon_interval_secs: f64,
    pub communication_range: f64,
    pub tick_secs: f64,
    pub seed: u64,
    pub adversary: AdversaryConfig,
    pub traffic: TrafficConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_vehicles: 50,
            num_malicious: 5,
            sim_time_secs: 300.0,
            area_size: 1000.0,
            min_speed_kmh: 20.0,
            max_speed_kmh: 50.0,
            beacon_interval_secs: 1.0,
            communication_range: 200.0,
            tick_secs: 0.1,
            seed: 42,
            adversary: AdversaryConfig::default(),
            traffic: TrafficConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn tick_ms(&self) -> Timestamp {
        secs_to_millis(self.tick_secs)
    }

    pub fn sim_time_ms(&self) -> Timestamp {
        secs_to_millis(self.sim_time_secs)
    }

    pub fn beacon_interval_ms(&self) -> Timestamp {
        secs_to_millis(self.beacon_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_vehicles == 0 {
            return Err(Error::invalid("simulation.num_vehicles", "must be positive"));
        }
        if self.num_malicious > self.num_vehicles {
            return Err(Error::invalid(
                "simulation.num_malicious",
                format!(
                    "{} malicious vehicles exceed {} vehicles",
                    self.num_malicious, self.num_vehicles
                ),
            ));
        }
        positive("simulation.sim_time_secs", self.sim_time_secs)?;
        positive("simulation.area_size", self.area_size)?;
        positive("simulation.min_speed_kmh", self.min_speed_kmh)?;
        positive("simulation.max_speed_kmh", self.max_speed_kmh)?;
        positive("simulation.beacon_interval_secs", self.beacon_interval_secs)?;
        positive("simulation.communication_range", self.communication_range)?;
        positive("simulation.tick_secs", self.tick_secs)?;
        if self.tick_ms() == 0 {
            return Err(Error::invalid(
                "simulation.tick_secs",
                "must be at least one millisecond",
            ));
        }
        if self.min_speed_kmh > self.max_speed_kmh {
            return Err(Error::invalid(
                "simulation.min_speed_kmh",
                format!(
                    "min speed {} exceeds max speed {}",
                    self.min_speed_kmh, self.max_speed_kmh
                ),
            ));
        }
        unit_interval("traffic.data_rate", self.traffic.data_rate)?;
        if self.traffic.payload_bytes == 0 {
            return Err(Error::invalid("traffic.payload_bytes", "must be positive"));
        }
        self.adversary.validate()
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.protocol.validate()?;
        if self.simulation.max_speed_kmh > self.protocol.max_speed_kmh {
            return Err(Error::invalid(
                "simulation.max_speed_kmh",
                format!(
                    "vehicles may not be configured faster than the protocol cap of {} km/h",
                    self.protocol.max_speed_kmh
                ),
            ));
        }
        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(field, format!("must be positive, got {}", value)))
    }
}

fn unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid(field, format!("must be in [0, 1], got {}", value)))
    }
}
