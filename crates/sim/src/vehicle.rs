//! Simulated vehicle: a router plus kinematics and traffic generation.

use crate::adversary::Adversary;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::TAU;
use tracing::debug;
use vanetsec_core::types::MPS_TO_KMH;
use vanetsec_core::{millis_to_secs, NodeId, Position, SimulationConfig, Timestamp, TrafficConfig};
use vanetsec_mesh::{MeshError, SecureRouter};

/// Largest heading change per tick, radians.
pub const HEADING_JITTER_RAD: f64 = 0.1;

/// Largest speed change rate of the random walk, m/s².
pub const SPEED_JITTER_MPS2: f64 = 2.0;

/// Random-walk parameters shared by every vehicle.
#[derive(Debug, Clone, Copy)]
pub struct Kinematics {
    pub min_speed_mps: f64,
    pub max_speed_mps: f64,
    pub area_size: f64,
    pub tick_ms: Timestamp,
    pub heading_jitter: f64,
    pub speed_jitter: f64,
}

impl From<&SimulationConfig> for Kinematics {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            min_speed_mps: config.min_speed_kmh / MPS_TO_KMH,
            max_speed_mps: config.max_speed_kmh / MPS_TO_KMH,
            area_size: config.area_size,
            tick_ms: config.tick_ms(),
            heading_jitter: HEADING_JITTER_RAD,
            speed_jitter: SPEED_JITTER_MPS2,
        }
    }
}

impl Kinematics {
    pub fn clamp_speed(&self, speed_mps: f64) -> f64 {
        speed_mps.clamp(self.min_speed_mps, self.max_speed_mps)
    }
}

/// Identity of the vehicle at `index`.
pub fn vehicle_id(index: usize) -> NodeId {
    format!("vehicle_{index}")
}

/// Identity of the `k`-th fabricated identity of the vehicle at `index`.
pub fn sybil_id(index: usize, k: usize) -> NodeId {
    format!("vehicle_{index}_sybil_{k}")
}

#[derive(Debug)]
pub struct Vehicle {
    index: usize,
    router: SecureRouter,
    rng: ChaCha8Rng,
    heading: f64,
    speed_mps: f64,
    adversary: Option<Adversary>,
    next_beacon: Timestamp,
    pending_destination: Option<NodeId>,
}

impl Vehicle {
    pub fn new(
        index: usize,
        mut router: SecureRouter,
        rng: ChaCha8Rng,
        heading: f64,
        speed_mps: f64,
        adversary: Option<Adversary>,
    ) -> Self {
        router.set_heading(heading);
        Self {
            index,
            router,
            rng,
            heading,
            speed_mps,
            adversary,
            next_beacon: 0,
            pending_destination: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &str {
        self.router.node_id()
    }

    pub fn router(&self) -> &SecureRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut SecureRouter {
        &mut self.router
    }

    pub fn adversary(&self) -> Option<&Adversary> {
        self.adversary.as_ref()
    }

    pub fn is_malicious(&self) -> bool {
        self.adversary.is_some()
    }

    pub fn position(&self) -> &Position {
        self.router.position()
    }

    /// Attacks launched by this vehicle so far, including routing lies.
    pub fn attacks_attempted(&self) -> u64 {
        let metrics = self.router.metrics();
        let injected = self.adversary.as_ref().map_or(0, Adversary::attempted);
        injected + metrics.replies_overridden + metrics.relays_withheld
    }

    /// One random-walk step, wrapping at the area edges.
    pub fn advance(&mut self, now: Timestamp, kinematics: &Kinematics) {
        let dt = millis_to_secs(kinematics.tick_ms);
        let turn = kinematics.heading_jitter;
        let accel = kinematics.speed_jitter;

        self.heading = (self.heading + self.rng.gen_range(-turn..=turn)).rem_euclid(TAU);
        self.speed_mps =
            kinematics.clamp_speed(self.speed_mps + self.rng.gen_range(-accel..=accel) * dt);

        let current = *self.router.position();
        let step = self.speed_mps * dt;
        let next = Position::new(
            (current.x + step * self.heading.cos()).rem_euclid(kinematics.area_size),
            (current.y + step * self.heading.sin()).rem_euclid(kinematics.area_size),
            current.z,
            now,
        );

        self.router.set_heading(self.heading);
        if let Err(e) = self.router.update_position(next) {
            debug!(vehicle = %self.id(), error = %e, "Position update rejected");
            self.router.prune(now);
        }
    }

    /// Per-tick behavior: injections every tick, beacons and traffic once
    /// per beacon interval.
    pub fn on_tick(
        &mut self,
        now: Timestamp,
        beacon_interval_ms: Timestamp,
        vehicle_count: usize,
        traffic: &TrafficConfig,
        area_size: f64,
    ) {
        if let Some(adversary) = self.adversary.as_mut() {
            adversary.inject(&mut self.router, &mut self.rng);
        }

        if now < self.next_beacon {
            return;
        }
        self.next_beacon = now + beacon_interval_ms;

        let result = match self.adversary.as_mut() {
            Some(adversary) => adversary.beacon(&mut self.router, &mut self.rng, area_size, now),
            None => self.router.send_beacon(now),
        };
        if let Err(e) = result {
            debug!(vehicle = %self.id(), error = %e, "Beacon failed");
        }

        if !self.is_malicious() {
            self.originate(now, vehicle_count, traffic);
        }
    }

    /// Send application data. A destination without a route is retried
    /// once, at the next beacon interval, after discovery had a chance.
    fn originate(&mut self, now: Timestamp, vehicle_count: usize, traffic: &TrafficConfig) {
        let (destination, fresh) = match self.pending_destination.take() {
            Some(destination) => (destination, false),
            None => {
                if vehicle_count < 2 || !self.rng.gen_bool(traffic.data_rate) {
                    return;
                }
                let mut target = self.rng.gen_range(0..vehicle_count - 1);
                if target >= self.index {
                    target += 1;
                }
                (vehicle_id(target), true)
            }
        };

        let payload: Vec<u8> = (0..traffic.payload_bytes).map(|_| self.rng.gen()).collect();
        match self.router.send_data(&destination, payload, now) {
            Ok(_) => {}
            Err(MeshError::NoRoute { .. }) if fresh => {
                self.pending_destination = Some(destination);
            }
            Err(e) => {
                debug!(vehicle = %self.id(), destination = %destination, error = %e, "Data not sent");
            }
        }
    }

    /// Hand an inbound frame to the vehicle. Returns whether it was accepted.
    pub fn receive(&mut self, frame: &[u8], now: Timestamp) -> bool {
        if let Some(adversary) = self.adversary.as_mut() {
            adversary.capture(frame);
            if adversary.drops_inbound(&mut self.rng) {
                return false;
            }
        }
        self.router.receive_message(frame, now)
    }
}
