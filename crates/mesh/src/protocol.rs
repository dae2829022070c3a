//! Secure Routing State Machine
//!
//! [`SecureRouter`] is one node's complete protocol stack. It owns the
//! node's motion state, authenticator, neighbor and route tables, trust
//! engine and forwarding ledger. Nothing outside the router mutates them:
//! the scheduler only hands it frames, positions and the current time.
//!
//! Every outbound message is signed and queued as a raw frame in the
//! outbox. Every inbound frame is decoded, authenticated, then dispatched
//! by variant. Any failure drops the frame and `receive_message` reports
//! `false`; protocol errors additionally reset the node to `Idle`.

use crate::error::{MeshError, MeshResult};
use crate::message::{Beacon, DataPacket, RoutingMessage};
use crate::neighbor::NeighborTable;
use crate::routing::{RouteEntry, RouteTable};
use crate::sybil::SybilConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use vanetsec_core::types::MPS_TO_KMH;
use vanetsec_core::{MotionLimits, MotionState, NodeId, Position, ProtocolConfig, Timestamp};
use vanetsec_crypto::{AuthenticatorConfig, MessageAuthenticator, SecureMessage};
use vanetsec_trust_mesh::{
    ForwardingConfig, ForwardingLedger, ForwardingOutcome, PacketKey, Suspicion, TrustConfig,
    TrustEngine, TrustLevel,
};

/// Protocol state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterState {
    /// Initial state, and the state after a protocol error
    Idle,
    /// Exchanging beacons
    Beaconing,
    /// Waiting for route replies
    RouteDiscovery,
    /// Originating or relaying data
    Forwarding,
}

/// Hook for deviating from honest routing behavior.
///
/// Honest nodes use [`HonestBehavior`]. Adversary models implement this
/// to lie in route replies or to swallow traffic they should relay.
pub trait RoutingBehavior: Send + Sync + std::fmt::Debug {
    /// Hop count to claim in reply to a route request for `destination`.
    /// `None` answers from the node's real tables.
    fn advertise(&mut self, _destination: &str) -> Option<u8> {
        None
    }

    /// Whether to relay a packet handed to this node.
    fn relay(&mut self, _packet: &DataPacket) -> bool {
        true
    }
}

/// Follows the protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct HonestBehavior;

impl RoutingBehavior for HonestBehavior {}

/// Per-node counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterMetrics {
    /// Frames signed and queued
    pub emitted: u64,
    /// Inbound frames accepted and dispatched
    pub accepted: u64,
    /// Inbound frames rejected by the authenticator
    pub auth_failures: u64,
    /// Inbound frames that could not be decoded or dispatched
    pub malformed: u64,
    /// Attacks or misbehavior recognized by this node
    pub attacks_detected: u64,
    /// Data packets not handed to an untrusted next hop
    pub forwarding_refused: u64,
    /// Data packets relayed for others
    pub data_forwarded: u64,
    /// Data packets that reached this node as destination
    pub data_delivered: u64,
    /// Data packets originated by this node
    pub data_originated: u64,
    /// Route requests broadcast
    pub route_requests: u64,
    /// Replies answered with a fabricated hop count
    pub replies_overridden: u64,
    /// Relays withheld by the behavior hook
    pub relays_withheld: u64,
}

/// Protocol constants for one router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Physical bounds for own and neighbor movement
    pub motion_limits: MotionLimits,
    /// Route entry lifetime
    pub route_timeout_ms: Timestamp,
    /// Neighbor silence before eviction
    pub neighbor_timeout_ms: Timestamp,
    /// Exclusive hop-count ceiling
    pub max_hop_count: u8,
    /// Neighbor table capacity
    pub max_neighbors: usize,
    /// Route table capacity
    pub max_routes: usize,
    /// Trust engine constants
    pub trust: TrustConfig,
    /// Black-hole heuristic thresholds
    pub forwarding: ForwardingConfig,
    /// Sybil heuristic thresholds
    pub sybil: SybilConfig,
    /// Authenticator settings
    pub auth: AuthenticatorConfig,
}

impl From<&ProtocolConfig> for RouterConfig {
    fn from(protocol: &ProtocolConfig) -> Self {
        Self {
            motion_limits: protocol.motion_limits(),
            route_timeout_ms: protocol.route_timeout_ms(),
            neighbor_timeout_ms: protocol.neighbor_timeout_ms(),
            max_hop_count: protocol.max_hop_count,
            max_neighbors: protocol.max_neighbors,
            max_routes: protocol.max_routes,
            trust: TrustConfig::from(protocol),
            forwarding: ForwardingConfig::from(protocol),
            sybil: SybilConfig::from(protocol),
            auth: AuthenticatorConfig {
                freshness_tolerance_ms: protocol.freshness_tolerance_ms(),
                replay_window_depth: protocol.replay_window_depth,
                ..AuthenticatorConfig::default()
            },
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&ProtocolConfig::default())
    }
}

impl RouterConfig {
    /// Treat the area as a torus of side `extent` for movement checks.
    pub fn with_wrap_extent(mut self, extent: f64) -> Self {
        self.motion_limits = self.motion_limits.with_wrap_extent(extent);
        self
    }
}

/// One node's secure routing stack.
#[derive(Debug)]
pub struct SecureRouter {
    node_id: NodeId,
    auth: MessageAuthenticator,
    motion: MotionState,
    heading: f64,
    limits: MotionLimits,
    neighbors: NeighborTable,
    routes: RouteTable,
    trust: TrustEngine,
    forwarding: ForwardingLedger,
    sybil: SybilConfig,
    sybil_suspects: HashSet<NodeId>,
    black_hole_suspects: HashSet<NodeId>,
    behavior: Box<dyn RoutingBehavior>,
    state: RouterState,
    outbox: Vec<Vec<u8>>,
    inbox: Vec<DataPacket>,
    next_request_id: u64,
    next_data_sequence: u64,
    metrics: RouterMetrics,
}

impl SecureRouter {
    /// Build a router around an authenticator, starting at `initial`.
    pub fn new(auth: MessageAuthenticator, initial: MotionState, config: RouterConfig) -> Self {
        Self {
            node_id: auth.node_id().to_string(),
            auth,
            motion: initial,
            heading: 0.0,
            limits: config.motion_limits,
            neighbors: NeighborTable::new(
                config.max_neighbors,
                config.neighbor_timeout_ms,
                config.motion_limits,
            ),
            routes: RouteTable::new(
                config.max_routes,
                config.route_timeout_ms,
                config.max_hop_count,
            ),
            trust: TrustEngine::with_config(config.trust),
            forwarding: ForwardingLedger::new(config.forwarding),
            sybil: config.sybil,
            sybil_suspects: HashSet::new(),
            black_hole_suspects: HashSet::new(),
            behavior: Box::new(HonestBehavior),
            state: RouterState::Idle,
            outbox: Vec::new(),
            inbox: Vec::new(),
            next_request_id: 1,
            next_data_sequence: 1,
            metrics: RouterMetrics::default(),
        }
    }

    /// Replace the routing behavior.
    pub fn with_behavior(mut self, behavior: Box<dyn RoutingBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    /// Node identity.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Current protocol state.
    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Current position.
    pub fn position(&self) -> &Position {
        &self.motion.position
    }

    /// Current motion state.
    pub fn motion(&self) -> &MotionState {
        &self.motion
    }

    /// Per-node counters.
    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    /// Neighbor table.
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Authenticator, for inspecting metrics and keys.
    pub fn authenticator(&self) -> &MessageAuthenticator {
        &self.auth
    }

    /// Forwarding evidence about neighbors.
    pub fn forwarding(&self) -> &ForwardingLedger {
        &self.forwarding
    }

    /// Set the heading reported in beacons.
    pub fn set_heading(&mut self, heading: f64) {
        self.heading = heading;
    }

    /// Move to `new_position` if physically plausible, then prune tables
    /// and expire forwarding watchdogs at the new position's timestamp.
    /// On rejection nothing changes.
    pub fn update_position(&mut self, new_position: Position) -> MeshResult<()> {
        self.motion = self.limits.validate_and_apply(&self.motion, new_position)?;
        self.prune(new_position.timestamp);
        Ok(())
    }

    /// Drop expired neighbors and routes, and resolve overdue hand-offs.
    pub fn prune(&mut self, now: Timestamp) {
        for evicted in self.neighbors.prune(now) {
            self.sybil_suspects.remove(&evicted);
        }
        self.routes.prune(now);

        for outcome in self.forwarding.expire(now) {
            if let ForwardingOutcome::Dropped { subject, packet } = outcome {
                debug!(
                    node = %self.node_id,
                    subject = %subject,
                    origin = %packet.0,
                    sequence = packet.1,
                    "Forwarding watchdog expired"
                );
                self.trust.update(&subject, 0.0);
                self.refresh_black_hole_flag(&subject);
            }
        }
    }

    /// Beacon describing this node's current state.
    pub fn beacon(&self) -> Beacon {
        Beacon {
            id: self.node_id.clone(),
            position: self.motion.position,
            speed_kmh: self.motion.speed_mps * MPS_TO_KMH,
            heading: self.heading,
        }
    }

    /// Broadcast a beacon with the current state.
    pub fn send_beacon(&mut self, now: Timestamp) -> MeshResult<()> {
        let beacon = self.beacon();
        self.emit(&RoutingMessage::Hello(beacon), now)?;
        self.state = RouterState::Beaconing;
        Ok(())
    }

    /// Sign `message` at `now` and queue it.
    pub fn emit(&mut self, message: &RoutingMessage, now: Timestamp) -> MeshResult<()> {
        let payload = message.encode()?;
        let envelope = self.auth.create_secure_message(payload, now)?;
        self.outbox.push(envelope.to_bytes()?);
        self.metrics.emitted += 1;
        Ok(())
    }

    /// Queue an already-encoded frame.
    pub fn enqueue_frame(&mut self, frame: Vec<u8>) {
        self.outbox.push(frame);
    }

    /// Frames waiting for transmission.
    pub fn outbox(&self) -> &[Vec<u8>] {
        &self.outbox
    }

    /// Take every queued frame.
    pub fn drain_outbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }

    /// Take every data packet delivered to this node.
    pub fn drain_delivered(&mut self) -> Vec<DataPacket> {
        std::mem::take(&mut self.inbox)
    }

    /// Broadcast a route request for `destination`.
    pub fn find_route(&mut self, destination: &str, now: Timestamp) -> MeshResult<()> {
        let request = RoutingMessage::RouteRequest {
            request_id: self.next_request_id,
            origin: self.node_id.clone(),
            destination: destination.to_string(),
        };
        self.next_request_id += 1;
        self.emit(&request, now)?;
        self.metrics.route_requests += 1;
        self.state = RouterState::RouteDiscovery;
        Ok(())
    }

    /// Drop the route to `destination`.
    pub fn invalidate_route(&mut self, destination: &str) -> Option<RouteEntry> {
        self.routes.invalidate_route(destination)
    }

    /// Originate a data packet.
    ///
    /// Without a neighbor or fresh route to `destination` this broadcasts
    /// a route request and fails with [`MeshError::NoRoute`]; the caller
    /// may retry once replies have arrived.
    pub fn send_data(
        &mut self,
        destination: &str,
        payload: Vec<u8>,
        now: Timestamp,
    ) -> MeshResult<PacketKey> {
        if destination == self.node_id {
            return Err(MeshError::InvalidDestination {
                destination: destination.to_string(),
            });
        }

        let Some(next_hop) = self.next_hop(destination, now) else {
            self.find_route(destination, now)?;
            return Err(MeshError::NoRoute {
                destination: destination.to_string(),
            });
        };

        if !self.is_trusted(&next_hop) {
            self.refuse(destination, &next_hop);
            return Err(MeshError::UntrustedNextHop { next_hop });
        }

        let packet = DataPacket {
            origin: self.node_id.clone(),
            sequence: self.next_data_sequence,
            destination: destination.to_string(),
            next_hop,
            hop_count: 1,
            payload,
        };
        self.next_data_sequence += 1;

        let key = packet.key();
        self.transmit(packet, now)?;
        self.metrics.data_originated += 1;
        Ok(key)
    }

    /// Effective trust in `subject` from this node's point of view.
    pub fn trust_score(&self, subject: &str) -> f64 {
        self.trust.score(subject, self.suspicion(subject))
    }

    /// Whether `subject` may be used as a next hop.
    pub fn is_trusted(&self, subject: &str) -> bool {
        self.trust.is_trusted(subject, self.suspicion(subject))
    }

    /// Trust classification of `subject`.
    pub fn trust_level(&self, subject: &str) -> TrustLevel {
        self.trust.level(self.trust_score(subject))
    }

    /// Current heuristic verdicts about `subject`.
    pub fn suspicion(&self, subject: &str) -> Suspicion {
        Suspicion {
            black_hole: self.black_hole_suspects.contains(subject),
            sybil: self.sybil_suspects.contains(subject),
            position_falsified: self
                .neighbors
                .get(subject)
                .is_some_and(|entry| !entry.position_consistent),
        }
    }

    /// Handle one inbound frame. Returns whether it was accepted.
    pub fn receive_message(&mut self, raw: &[u8], now: Timestamp) -> bool {
        let envelope = match SecureMessage::from_bytes(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(node = %self.node_id, error = %e, "Dropping undecodable frame");
                self.protocol_error();
                return false;
            }
        };

        if envelope.sender == self.node_id {
            return false;
        }

        if self.auth.authenticate(&envelope, now).is_err() {
            self.metrics.auth_failures += 1;
            self.metrics.attacks_detected += 1;
            return false;
        }

        let message = match RoutingMessage::decode(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(
                    node = %self.node_id,
                    sender = %envelope.sender,
                    error = %e,
                    "Dropping malformed payload"
                );
                self.protocol_error();
                return false;
            }
        };

        let kind = message.kind();
        match self.dispatch(&envelope, message, now) {
            Ok(()) => {
                self.metrics.accepted += 1;
                true
            }
            Err(e) => {
                debug!(
                    node = %self.node_id,
                    sender = %envelope.sender,
                    kind = ?kind,
                    error = %e,
                    "Protocol error"
                );
                self.protocol_error();
                false
            }
        }
    }

    fn dispatch(
        &mut self,
        envelope: &SecureMessage,
        message: RoutingMessage,
        now: Timestamp,
    ) -> Result<(), DispatchError> {
        let sender = envelope.sender.as_str();
        match message {
            RoutingMessage::Hello(beacon) => {
                self.handle_hello(sender, &beacon, envelope.timestamp, now)
            }
            RoutingMessage::RouteRequest {
                origin,
                destination,
                ..
            } => self.handle_route_request(sender, &origin, &destination, now),
            RoutingMessage::RouteReply {
                requester,
                destination,
                hop_count,
            } => {
                self.handle_route_reply(
                    sender,
                    &requester,
                    &destination,
                    hop_count,
                    envelope.timestamp,
                    now,
                );
                Ok(())
            }
            RoutingMessage::RouteError {
                upstream,
                unreachable,
            } => {
                self.handle_route_error(sender, &upstream, &unreachable);
                Ok(())
            }
            RoutingMessage::Data(packet) => self.handle_data(sender, packet, now),
        }
    }

    fn handle_hello(
        &mut self,
        sender: &str,
        beacon: &Beacon,
        sent_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), DispatchError> {
        if beacon.id != sender {
            return Err(DispatchError::IdentityMismatch);
        }

        match self.neighbors.upsert_neighbor(beacon, sent_at, now) {
            Ok(()) => {
                self.trust.update(sender, 1.0);
            }
            Err(rejection) => {
                warn!(
                    node = %self.node_id,
                    subject = %sender,
                    reason = %rejection,
                    "Implausible position reported"
                );
                self.trust.update(sender, 0.0);
                self.metrics.attacks_detected += 1;
            }
        }

        let mates = self.sybil.cluster_mates(&self.neighbors, sender);
        if mates.is_empty() {
            self.sybil_suspects.remove(sender);
        } else {
            for id in std::iter::once(sender.to_string()).chain(mates) {
                if self.sybil_suspects.insert(id.clone()) {
                    warn!(node = %self.node_id, subject = %id, "Sybil cluster detected");
                    self.metrics.attacks_detected += 1;
                }
            }
        }

        if self.state == RouterState::Idle {
            self.state = RouterState::Beaconing;
        }
        Ok(())
    }

    fn handle_route_request(
        &mut self,
        sender: &str,
        origin: &str,
        destination: &str,
        now: Timestamp,
    ) -> Result<(), DispatchError> {
        if origin != sender || origin == self.node_id {
            return Ok(());
        }

        let honest = if destination == self.node_id {
            Some(0)
        } else if self.neighbors.is_fresh(destination, now) {
            Some(1)
        } else {
            self.routes
                .lookup(destination, now)
                .filter(|route| route.next_hop != origin)
                .map(|route| route.hop_count)
        };

        let hop_count = match self.behavior.advertise(destination) {
            Some(claimed) => {
                self.metrics.replies_overridden += 1;
                Some(claimed)
            }
            None => honest,
        };

        if let Some(hop_count) = hop_count {
            let reply = RoutingMessage::RouteReply {
                requester: origin.to_string(),
                destination: destination.to_string(),
                hop_count,
            };
            self.emit(&reply, now)?;
        }
        Ok(())
    }

    fn handle_route_reply(
        &mut self,
        sender: &str,
        requester: &str,
        destination: &str,
        hop_count: u8,
        sent_at: Timestamp,
        now: Timestamp,
    ) {
        self.forwarding
            .record_advertisement(sender, destination, hop_count);
        self.refresh_black_hole_flag(sender);

        if requester != self.node_id || destination == self.node_id {
            return;
        }
        if !self.is_trusted(sender) {
            debug!(
                node = %self.node_id,
                replier = %sender,
                destination = %destination,
                "Ignoring route through untrusted replier"
            );
            return;
        }

        let entry = RouteEntry {
            destination: destination.to_string(),
            next_hop: sender.to_string(),
            hop_count: hop_count.saturating_add(1),
            timestamp: sent_at,
            trust_score: self.trust_score(sender),
        };
        if self.routes.upsert_route(destination, entry, now) {
            self.state = RouterState::Beaconing;
        }
    }

    fn handle_route_error(&mut self, sender: &str, upstream: &str, unreachable: &str) {
        if upstream != self.node_id {
            return;
        }
        self.routes.invalidate_via(unreachable, sender);
        self.forwarding.release(sender, unreachable);
    }

    fn handle_data(
        &mut self,
        sender: &str,
        packet: DataPacket,
        now: Timestamp,
    ) -> Result<(), DispatchError> {
        if packet.destination == self.node_id {
            self.metrics.data_delivered += 1;
            self.inbox.push(packet);
            return Ok(());
        }

        // Overheard relays resolve our own hand-offs
        if self.forwarding.confirm(sender, &packet.key()).is_some() {
            self.trust.update(sender, 1.0);
            self.refresh_black_hole_flag(sender);
        }

        if packet.next_hop != self.node_id {
            return Ok(());
        }

        if !self.behavior.relay(&packet) {
            self.metrics.relays_withheld += 1;
            return Ok(());
        }

        if packet.hop_count.saturating_add(1) >= self.routes.max_hop_count() {
            debug!(node = %self.node_id, origin = %packet.origin, "Hop limit reached");
            return Ok(());
        }

        let Some(next_hop) = self.next_hop(&packet.destination, now) else {
            let error = RoutingMessage::RouteError {
                upstream: sender.to_string(),
                unreachable: packet.destination.clone(),
            };
            self.emit(&error, now)?;
            return Ok(());
        };

        if !self.is_trusted(&next_hop) {
            self.refuse(&packet.destination, &next_hop);
            return Ok(());
        }

        let relayed = DataPacket {
            next_hop,
            hop_count: packet.hop_count + 1,
            ..packet
        };
        self.transmit(relayed, now)?;
        self.metrics.data_forwarded += 1;
        Ok(())
    }

    /// Destination itself when it is a neighbor, otherwise the route's
    /// next hop.
    fn next_hop(&self, destination: &str, now: Timestamp) -> Option<NodeId> {
        if self.neighbors.is_fresh(destination, now) {
            return Some(destination.to_string());
        }
        self.routes
            .lookup(destination, now)
            .map(|route| route.next_hop.clone())
    }

    fn transmit(&mut self, packet: DataPacket, now: Timestamp) -> MeshResult<()> {
        let watch = (packet.next_hop != packet.destination)
            .then(|| (packet.next_hop.clone(), packet.key(), packet.destination.clone()));
        self.emit(&RoutingMessage::Data(packet), now)?;
        if let Some((next_hop, key, destination)) = watch {
            self.forwarding
                .record_handoff(&next_hop, key, &destination, now);
        }
        self.state = RouterState::Forwarding;
        Ok(())
    }

    fn refuse(&mut self, destination: &str, next_hop: &str) {
        warn!(
            node = %self.node_id,
            next_hop = %next_hop,
            destination = %destination,
            trust = self.trust_score(next_hop),
            "Refusing untrusted next hop"
        );
        self.routes.invalidate_via(destination, next_hop);
        self.metrics.forwarding_refused += 1;
        self.metrics.attacks_detected += 1;
    }

    fn refresh_black_hole_flag(&mut self, subject: &str) {
        if self.forwarding.is_black_hole_suspect(subject) {
            if self.black_hole_suspects.insert(subject.to_string()) {
                warn!(node = %self.node_id, subject = %subject, "Black hole suspected");
                self.metrics.attacks_detected += 1;
            }
        } else {
            self.black_hole_suspects.remove(subject);
        }
    }

    fn protocol_error(&mut self) {
        self.metrics.malformed += 1;
        self.state = RouterState::Idle;
    }
}

/// Reasons a decoded, authenticated message could not be applied.
#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error("Beacon identity does not match sender")]
    IdentityMismatch,

    #[error(transparent)]
    Mesh(#[from] MeshError),
}
