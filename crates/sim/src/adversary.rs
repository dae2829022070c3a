//! Adversary behavior model.
//!
//! A malicious vehicle runs the same [`SecureRouter`] as everyone else and
//! holds valid credentials. What differs is what it chooses to send:
//!
//! - beacons with fabricated positions, or no beacon at all
//! - dropped inbound frames
//! - verbatim replays and tampered copies of frames it overheard
//! - route replies claiming one hop to anything, then swallowed data
//! - extra identities beaconing from its own location
//!
//! Every rate comes from [`AdversaryConfig`]. All randomness is drawn from
//! the owning vehicle's generator, so runs stay reproducible.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::f64::consts::TAU;
use vanetsec_core::{AdversaryConfig, Position, Timestamp};
use vanetsec_crypto::{MessageAuthenticator, SecureMessage};
use vanetsec_mesh::{Beacon, DataPacket, MeshResult, RoutingBehavior, RoutingMessage, SecureRouter};

/// Frames remembered for later replay or tampering.
pub const CAPTURE_CAPACITY: usize = 32;

/// Radius around the attacker within which Sybil identities claim to be.
pub const SYBIL_OFFSET_M: f64 = 0.4;

/// Claims a one-hop route to every destination and relays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackHole;

impl RoutingBehavior for BlackHole {
    fn advertise(&mut self, _destination: &str) -> Option<u8> {
        Some(1)
    }

    fn relay(&mut self, _packet: &DataPacket) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct Adversary {
    config: AdversaryConfig,
    sybils: Vec<MessageAuthenticator>,
    captured: VecDeque<Vec<u8>>,
    attempted: u64,
}

impl Adversary {
    pub fn new(config: AdversaryConfig, sybils: Vec<MessageAuthenticator>) -> Self {
        Self {
            config,
            sybils,
            captured: VecDeque::with_capacity(CAPTURE_CAPACITY),
            attempted: 0,
        }
    }

    pub fn config(&self) -> &AdversaryConfig {
        &self.config
    }

    /// Identities this adversary fabricates.
    pub fn sybil_ids(&self) -> impl Iterator<Item = &str> {
        self.sybils.iter().map(|sybil| sybil.node_id())
    }

    /// Attacks launched so far by this model (not counting routing lies,
    /// which the router records itself).
    pub fn attempted(&self) -> u64 {
        self.attempted
    }

    /// Remember an overheard frame.
    pub fn capture(&mut self, frame: &[u8]) {
        if self.captured.len() == CAPTURE_CAPACITY {
            self.captured.pop_front();
        }
        self.captured.push_back(frame.to_vec());
    }

    /// Decide whether to silently drop an inbound frame.
    pub fn drops_inbound(&self, rng: &mut ChaCha8Rng) -> bool {
        rng.gen_bool(self.config.drop_rate)
    }

    /// Beacon-interval behavior: withhold, falsify, or beacon honestly,
    /// then beacon every Sybil identity.
    pub fn beacon(
        &mut self,
        router: &mut SecureRouter,
        rng: &mut ChaCha8Rng,
        area_size: f64,
        now: Timestamp,
    ) -> MeshResult<()> {
        if !rng.gen_bool(self.config.drop_rate) {
            if rng.gen_bool(self.config.falsification_rate) {
                let mut beacon = router.beacon();
                beacon.position = Position::new(
                    rng.gen_range(0.0..area_size),
                    rng.gen_range(0.0..area_size),
                    beacon.position.z,
                    beacon.position.timestamp,
                );
                router.emit(&RoutingMessage::Hello(beacon), now)?;
                self.attempted += 1;
            } else {
                router.send_beacon(now)?;
            }
        }
        self.sybil_beacons(router, rng, now)
    }

    fn sybil_beacons(
        &mut self,
        router: &mut SecureRouter,
        rng: &mut ChaCha8Rng,
        now: Timestamp,
    ) -> MeshResult<()> {
        let own = router.beacon();
        for sybil in &mut self.sybils {
            let angle = rng.gen_range(0.0..TAU);
            let radius = rng.gen_range(0.0..SYBIL_OFFSET_M);
            let beacon = Beacon {
                id: sybil.node_id().to_string(),
                position: Position::new(
                    own.position.x + radius * angle.cos(),
                    own.position.y + radius * angle.sin(),
                    own.position.z,
                    own.position.timestamp,
                ),
                speed_kmh: own.speed_kmh,
                heading: own.heading,
            };
            let payload = RoutingMessage::Hello(beacon).encode()?;
            let envelope = sybil.create_secure_message(payload, now)?;
            router.enqueue_frame(envelope.to_bytes()?);
            self.attempted += 1;
        }
        Ok(())
    }

    /// Per-tick injection of replayed and tampered frames.
    pub fn inject(&mut self, router: &mut SecureRouter, rng: &mut ChaCha8Rng) {
        if self.captured.is_empty() {
            return;
        }

        if rng.gen_bool(self.config.replay_rate) {
            let index = rng.gen_range(0..self.captured.len());
            router.enqueue_frame(self.captured[index].clone());
            self.attempted += 1;
        }

        if rng.gen_bool(self.config.tamper_rate) {
            let index = rng.gen_range(0..self.captured.len());
            let Ok(mut message) = SecureMessage::from_bytes(&self.captured[index]) else {
                return;
            };
            if message.payload.is_empty() {
                return;
            }
            let offset = rng.gen_range(0..message.payload.len());
            message.payload[offset] ^= 0x20;
            if let Ok(frame) = message.to_bytes() {
                router.enqueue_frame(frame);
                self.attempted += 1;
            }
        }
    }
}
