//! Tick-driven simulation scheduler.
//!
//! Each tick runs in four phases:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ 1. Mobility    every vehicle moves (par_iter_mut)          │
//! │ 2. Behavior    beacons, traffic, injections (par_iter_mut) │
//! │ 3. Transmit    outboxes drained in index order             │
//! │ 4. Receive     each receiver consumes in-range frames      │
//! │                in sender index order (par_iter_mut)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every vehicle owns its own generator, seeded from the run seed and its
//! index, and only ever mutates itself inside a parallel phase. Frames a
//! vehicle queues while receiving go out in the next tick. Together this
//! keeps results identical for a given seed whatever the thread count.
//!
//! Delivery is all-pairs, so a tick costs O(n²) distance checks. That is
//! fine up to a few hundred vehicles.

use crate::adversary::{Adversary, BlackHole};
use crate::error::{SimError, SimResult};
use crate::stats::{NodeSnapshot, SimulationStats, TickCounters};
use crate::vehicle::{sybil_id, vehicle_id, Kinematics, Vehicle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;
use tracing::{debug, info};
use vanetsec_core::types::MPS_TO_KMH;
use vanetsec_core::{Config, MotionState, NodeId, Position, Timestamp};
use vanetsec_crypto::MessageAuthenticator;
use vanetsec_mesh::{RouterConfig, SecureRouter};

const SEED_MIX: u64 = 0x517c_c1b7_2722_0a95;

/// Initial state of one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub speed_kmh: f64,
    pub heading: f64,
}

/// Generator for the vehicle at `index`.
fn vehicle_rng(seed: u64, index: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64).wrapping_mul(SEED_MIX))
}

pub struct Simulation {
    config: Config,
    kinematics: Kinematics,
    vehicles: Vec<Vehicle>,
    index: HashMap<NodeId, usize>,
    stats: SimulationStats,
    now: Timestamp,
    tick: u64,
    attempted_so_far: u64,
    detected_so_far: u64,
}

impl Simulation {
    /// Build a simulation with uniformly random placements.
    pub fn new(config: Config) -> SimResult<Self> {
        config.validate()?;
        let sim = &config.simulation;
        let mut rng = ChaCha8Rng::seed_from_u64(sim.seed);
        let placements = (0..sim.num_vehicles)
            .map(|_| Placement {
                x: rng.gen_range(0.0..sim.area_size),
                y: rng.gen_range(0.0..sim.area_size),
                speed_kmh: rng.gen_range(sim.min_speed_kmh..=sim.max_speed_kmh),
                heading: rng.gen_range(0.0..TAU),
            })
            .collect();
        Self::with_placements(config, placements)
    }

    /// Build a simulation with explicit initial placements, one per vehicle.
    /// The last `num_malicious` vehicles are adversaries.
    pub fn with_placements(config: Config, placements: Vec<Placement>) -> SimResult<Self> {
        config.validate()?;
        let sim = &config.simulation;
        if placements.len() != sim.num_vehicles {
            return Err(SimError::PlacementCount {
                expected: sim.num_vehicles,
                actual: placements.len(),
            });
        }

        let kinematics = Kinematics::from(sim);
        let first_malicious = sim.num_vehicles - sim.num_malicious;
        let vehicles: Vec<Vehicle> = placements
            .iter()
            .enumerate()
            .map(|(i, placement)| {
                build_vehicle(&config, &kinematics, i, placement, i >= first_malicious)
            })
            .collect();
        let index = vehicles
            .iter()
            .map(|vehicle| (vehicle.id().to_string(), vehicle.index()))
            .collect();

        info!(
            vehicles = sim.num_vehicles,
            malicious = sim.num_malicious,
            area = sim.area_size,
            range = sim.communication_range,
            seed = sim.seed,
            "Simulation initialized"
        );

        Ok(Self {
            config,
            kinematics,
            vehicles,
            index,
            stats: SimulationStats::new(),
            now: 0,
            tick: 0,
            attempted_so_far: 0,
            detected_so_far: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Logical time of the last completed tick.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.index.get(id).map(|&i| &self.vehicles[i])
    }

    pub fn router(&self, id: &str) -> Option<&SecureRouter> {
        self.vehicle(id).map(Vehicle::router)
    }

    /// Trust `observer` places in `subject`, if `observer` exists.
    pub fn trust_score(&self, observer: &str, subject: &str) -> Option<f64> {
        self.router(observer).map(|router| router.trust_score(subject))
    }

    /// Current position of every vehicle.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.vehicles
            .iter()
            .map(|vehicle| NodeSnapshot {
                id: vehicle.id().to_string(),
                position: *vehicle.position(),
                is_malicious: vehicle.is_malicious(),
            })
            .collect()
    }

    /// Run until the configured simulated time has elapsed.
    pub fn run(&mut self) -> &SimulationStats {
        let end = self.config.simulation.sim_time_ms();
        while self.now < end {
            self.step();
        }

        info!(
            ticks = self.tick,
            sent = self.stats.total_sent(),
            received = self.stats.total_received(),
            pdr = self.stats.packet_delivery_ratio(),
            attacks_attempted = self.stats.total_attacks_attempted(),
            attacks_detected = self.stats.total_attacks_detected(),
            "Simulation complete"
        );
        &self.stats
    }

    /// Advance by one tick.
    pub fn step(&mut self) {
        self.tick += 1;
        self.now += self.kinematics.tick_ms;
        let now = self.now;
        let sim = &self.config.simulation;

        // Phase 1: mobility
        let kinematics = self.kinematics;
        self.vehicles
            .par_iter_mut()
            .for_each(|vehicle| vehicle.advance(now, &kinematics));

        // Phase 2: beacons, traffic, injections
        let beacon_interval = sim.beacon_interval_ms();
        let count = self.vehicles.len();
        let traffic = &sim.traffic;
        let area = sim.area_size;
        self.vehicles
            .par_iter_mut()
            .for_each(|vehicle| vehicle.on_tick(now, beacon_interval, count, traffic, area));

        // Phase 3: transmit
        let transmissions: Vec<(Position, Vec<Vec<u8>>)> = self
            .vehicles
            .iter_mut()
            .map(|vehicle| (*vehicle.position(), vehicle.router_mut().drain_outbox()))
            .collect();

        // Phase 4: receive
        let range = sim.communication_range;
        let (sent, received) = self
            .vehicles
            .par_iter_mut()
            .enumerate()
            .map(|(receiver, vehicle)| {
                let here = *vehicle.position();
                let mut sent = 0u64;
                let mut received = 0u64;
                for (sender, (position, frames)) in transmissions.iter().enumerate() {
                    if sender == receiver || here.planar_distance_to(position) > range {
                        continue;
                    }
                    for frame in frames {
                        sent += 1;
                        if vehicle.receive(frame, now) {
                            received += 1;
                        }
                    }
                }
                (sent, received)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

        let data_delivered: u64 = self
            .vehicles
            .iter_mut()
            .map(|vehicle| vehicle.router_mut().drain_delivered().len() as u64)
            .sum();

        let attempted: u64 = self.vehicles.iter().map(Vehicle::attacks_attempted).sum();
        let detected: u64 = self
            .vehicles
            .iter()
            .map(|vehicle| vehicle.router().metrics().attacks_detected)
            .sum();
        let counters = TickCounters {
            messages_sent: sent,
            messages_received: received,
            attacks_attempted: attempted - self.attempted_so_far,
            attacks_detected: detected - self.detected_so_far,
            data_delivered,
        };
        self.attempted_so_far = attempted;
        self.detected_so_far = detected;

        let mean_trust = self.mean_trust();
        let sample = self.stats.record(self.tick, now, counters, mean_trust);
        debug!(
            tick = sample.tick,
            sent = sample.messages_sent,
            received = sample.messages_received,
            pdr = sample.packet_delivery_ratio,
            trust = sample.mean_trust_score,
            "Tick complete"
        );
    }

    /// Mean trust over every ordered pair of distinct vehicles. Fabricated
    /// identities are not vehicles and do not count.
    pub fn mean_trust(&self) -> f64 {
        let n = self.vehicles.len();
        if n < 2 {
            return 1.0;
        }
        let ids: Vec<NodeId> = (0..n).map(vehicle_id).collect();

        // Summed in index order so the float result is reproducible
        let per_observer: Vec<f64> = self
            .vehicles
            .par_iter()
            .map(|vehicle| {
                let router = vehicle.router();
                ids.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != vehicle.index())
                    .map(|(_, id)| router.trust_score(id))
                    .sum()
            })
            .collect();
        per_observer.iter().sum::<f64>() / (n * (n - 1)) as f64
    }
}

fn build_vehicle(
    config: &Config,
    kinematics: &Kinematics,
    index: usize,
    placement: &Placement,
    malicious: bool,
) -> Vehicle {
    let sim = &config.simulation;
    let mut rng = vehicle_rng(sim.seed, index);

    let mut router_config = RouterConfig::from(&config.protocol).with_wrap_extent(sim.area_size);
    // Credentials issued at time zero must outlive the run
    router_config.auth.certificate_lifetime_ms = router_config
        .auth
        .certificate_lifetime_ms
        .max(sim.sim_time_ms() + router_config.auth.freshness_tolerance_ms);

    let credentials = |id: String, rng: &mut ChaCha8Rng| {
        let mut auth = MessageAuthenticator::new(id, router_config.auth.clone(), rng);
        auth.issue_certificate(0);
        auth
    };

    let auth = credentials(vehicle_id(index), &mut rng);
    let speed_mps = kinematics.clamp_speed(placement.speed_kmh / MPS_TO_KMH);
    let start = MotionState::new(Position::new(placement.x, placement.y, 0.0, 0), speed_mps);
    let mut router = SecureRouter::new(auth, start, router_config.clone());

    let adversary = if malicious {
        let sybils = (0..sim.adversary.sybil_identities)
            .map(|k| credentials(sybil_id(index, k), &mut rng))
            .collect();
        if sim.adversary.black_hole {
            router = router.with_behavior(Box::new(BlackHole));
        }
        Some(Adversary::new(sim.adversary.clone(), sybils))
    } else {
        None
    };

    Vehicle::new(index, router, rng, placement.heading, speed_mps, adversary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanetsec_core::SimulationConfig;

    fn small_config(vehicles: usize, malicious: usize) -> Config {
        Config {
            simulation: SimulationConfig {
                num_vehicles: vehicles,
                num_malicious: malicious,
                sim_time_secs: 5.0,
                area_size: 300.0,
                seed: 11,
                ..SimulationConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = small_config(2, 3);
        assert!(matches!(Simulation::new(config), Err(SimError::Config(_))));
    }

    #[test]
    fn test_placement_count_checked() {
        let config = small_config(3, 0);
        let placements = vec![
            Placement {
                x: 0.0,
                y: 0.0,
                speed_kmh: 30.0,
                heading: 0.0,
            };
            2
        ];
        assert!(matches!(
            Simulation::with_placements(config, placements),
            Err(SimError::PlacementCount {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_last_vehicles_malicious() {
        let sim = Simulation::new(small_config(5, 2)).unwrap();
        let flags: Vec<bool> = sim.snapshot().iter().map(|n| n.is_malicious).collect();
        assert_eq!(flags, vec![false, false, false, true, true]);
        assert!(sim.router("vehicle_4").is_some());
        assert!(sim.router("vehicle_4_sybil_0").is_none());
    }

    #[test]
    fn test_run_records_every_tick() {
        let mut sim = Simulation::new(small_config(4, 0)).unwrap();
        let stats = sim.run();
        assert_eq!(stats.samples().len(), 50);
        assert_eq!(stats.last().unwrap().time_ms, 5_000);
        assert_eq!(sim.now(), 5_000);
    }

    #[test]
    fn test_single_vehicle_mean_trust() {
        let mut sim = Simulation::new(small_config(1, 0)).unwrap();
        sim.step();
        assert_eq!(sim.mean_trust(), 1.0);
        assert_eq!(sim.stats().total_sent(), 0);
    }

    #[test]
    fn test_same_seed_same_results() {
        let mut a = Simulation::new(small_config(6, 2)).unwrap();
        let mut b = Simulation::new(small_config(6, 2)).unwrap();
        a.run();
        b.run();
        assert_eq!(a.stats().samples(), b.stats().samples());
        assert_eq!(a.snapshot(), b.snapshot());
    }
}
