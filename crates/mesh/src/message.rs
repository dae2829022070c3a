//! Routing messages carried inside signed envelopes.
//!
//! A [`RoutingMessage`] is JSON-encoded and becomes the payload of a
//! [`vanetsec_crypto::SecureMessage`]. The sender of every variant is the
//! envelope's authenticated sender, so no variant repeats it.

use crate::error::MeshResult;
use serde::{Deserialize, Serialize};
use vanetsec_core::{NodeId, Position};
use vanetsec_trust_mesh::PacketKey;

/// Periodic announcement of identity and kinematic state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    /// Claimed identity, must match the envelope sender
    pub id: NodeId,
    /// Reported position
    pub position: Position,
    /// Reported speed in km/h
    pub speed_kmh: f64,
    /// Reported heading in radians
    pub heading: f64,
}

/// Application payload travelling hop by hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPacket {
    /// Originating node
    pub origin: NodeId,
    /// Per-origin packet sequence
    pub sequence: u64,
    /// Final destination
    pub destination: NodeId,
    /// Node expected to handle this transmission
    pub next_hop: NodeId,
    /// Transmissions so far, including this one
    pub hop_count: u8,
    /// Application bytes
    pub payload: Vec<u8>,
}

impl DataPacket {
    /// Stable identity of the packet across hops.
    pub fn key(&self) -> PacketKey {
        (self.origin.clone(), self.sequence)
    }
}

/// Protocol message variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingMessage {
    /// Beacon
    Hello(Beacon),
    /// Route discovery broadcast
    RouteRequest {
        /// Per-origin request counter
        request_id: u64,
        /// Node looking for a route
        origin: NodeId,
        /// Sought destination
        destination: NodeId,
    },
    /// Answer to a route request, addressed to the requester
    RouteReply {
        /// Node that asked
        requester: NodeId,
        /// Destination the replier can reach
        destination: NodeId,
        /// Replier's distance to the destination in hops
        hop_count: u8,
    },
    /// Notice that a relay cannot reach a destination
    RouteError {
        /// Node that handed over the packet
        upstream: NodeId,
        /// Destination that could not be reached
        unreachable: NodeId,
    },
    /// Data packet
    Data(DataPacket),
}

/// Discriminant of a [`RoutingMessage`], used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// HELLO
    Hello,
    /// ROUTE_REQUEST
    RouteRequest,
    /// ROUTE_REPLY
    RouteReply,
    /// ROUTE_ERROR
    RouteError,
    /// DATA
    Data,
}

impl RoutingMessage {
    /// Variant of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            RoutingMessage::Hello(_) => MessageKind::Hello,
            RoutingMessage::RouteRequest { .. } => MessageKind::RouteRequest,
            RoutingMessage::RouteReply { .. } => MessageKind::RouteReply,
            RoutingMessage::RouteError { .. } => MessageKind::RouteError,
            RoutingMessage::Data(_) => MessageKind::Data,
        }
    }

    /// Encode as an envelope payload.
    pub fn encode(&self) -> MeshResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an envelope payload.
    pub fn decode(bytes: &[u8]) -> MeshResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
