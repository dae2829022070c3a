//! Message Authenticator - signed envelopes with replay detection.
//!
//! Every frame on the simulated medium is a [`SecureMessage`]. The signature
//! covers one blob, `payload ‖ timestamp ‖ sequence_number` (both integers
//! big-endian), so a valid signature cannot be detached and re-attached to
//! a different time or sequence number.
//!
//! Verification is fail-closed and ordered:
//!
//! 1. timestamp within the freshness tolerance of the receiver's clock
//! 2. not present in the sender's replay window
//! 3. group MAC valid (only when a group key is configured)
//! 4. attached certificate valid at `now` and issued to the sender
//! 5. signature valid under the resolved key (certificate key first,
//!    then a previously learned key for the sender id)
//!
//! Callers only see accept or reject. The narrow cause is logged and
//! counted in [`AuthMetrics`].

use crate::certificate::{Certificate, DEFAULT_CERTIFICATE_LIFETIME_MS};
use crate::hashing::{digest, DigestAlgorithm, MacKey, PayloadHash};
use crate::replay::{ReplayEntry, ReplayWindow, DEFAULT_REPLAY_WINDOW_DEPTH};
use crate::signing::{self, KeyPair, PublicKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use vanetsec_core::{NodeId, Timestamp};

/// Default freshness tolerance (5 seconds).
pub const DEFAULT_FRESHNESS_TOLERANCE_MS: Timestamp = 5_000;

/// Signed envelope for every protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureMessage {
    /// Declared sender identity
    pub sender: NodeId,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    pub timestamp: Timestamp,
    pub sequence_number: u64,
    pub sender_cert: Option<Certificate>,
    /// Keyed BLAKE3 tag over the signed blob
    pub mac: Option<Vec<u8>>,
}

impl SecureMessage {
    pub fn signed_blob(&self) -> Vec<u8> {
        signed_blob(&self.payload, self.timestamp, self.sequence_number)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// `payload ‖ timestamp (u64 BE) ‖ sequence_number (u64 BE)`
pub fn signed_blob(payload: &[u8], timestamp: Timestamp, sequence_number: u64) -> Vec<u8> {
    let mut blob = Vec::with_capacity(payload.len() + 16);
    blob.extend_from_slice(payload);
    blob.extend_from_slice(&timestamp.to_be_bytes());
    blob.extend_from_slice(&sequence_number.to_be_bytes());
    blob
}

/// Errors raised while producing or decoding messages.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Refusing to sign an empty payload")]
    EmptyPayload,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Narrow cause of a rejected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthFailure {
    Stale,
    Replay,
    BadMac,
    CertificateInvalid,
    UnknownSender,
    BadSignature,
}

/// Counters for observability and tests.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuthMetrics {
    pub messages_created: u64,
    pub messages_accepted: u64,
    pub stale: u64,
    pub replays: u64,
    pub bad_mac: u64,
    pub certificate_invalid: u64,
    pub unknown_sender: u64,
    pub bad_signature: u64,
}

impl AuthMetrics {
    fn record_failure(&mut self, failure: AuthFailure) {
        match failure {
            AuthFailure::Stale => self.stale += 1,
            AuthFailure::Replay => self.replays += 1,
            AuthFailure::BadMac => self.bad_mac += 1,
            AuthFailure::CertificateInvalid => self.certificate_invalid += 1,
            AuthFailure::UnknownSender => self.unknown_sender += 1,
            AuthFailure::BadSignature => self.bad_signature += 1,
        }
    }

    pub fn total_rejected(&self) -> u64 {
        self.stale
            + self.replays
            + self.bad_mac
            + self.certificate_invalid
            + self.unknown_sender
            + self.bad_signature
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    pub freshness_tolerance_ms: Timestamp,
    pub replay_window_depth: usize,
    pub digest: DigestAlgorithm,
    pub certificate_lifetime_ms: Timestamp,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            freshness_tolerance_ms: DEFAULT_FRESHNESS_TOLERANCE_MS,
            replay_window_depth: DEFAULT_REPLAY_WINDOW_DEPTH,
            digest: DigestAlgorithm::Blake3,
            certificate_lifetime_ms: DEFAULT_CERTIFICATE_LIFETIME_MS,
        }
    }
}

/// Per-node signer and verifier.
#[derive(Debug)]
pub struct MessageAuthenticator {
    node_id: NodeId,
    key_pair: KeyPair,
    certificate: Option<Certificate>,
    next_sequence: u64,
    replay_window: ReplayWindow,
    known_keys: HashMap<NodeId, PublicKey>,
    group_key: Option<MacKey>,
    config: AuthenticatorConfig,
    metrics: AuthMetrics,
}

impl MessageAuthenticator {
    /// Create an authenticator with a freshly generated key pair.
    pub fn new<R: RngCore + CryptoRng>(
        node_id: impl Into<NodeId>,
        config: AuthenticatorConfig,
        rng: &mut R,
    ) -> Self {
        Self::with_key_pair(node_id, KeyPair::generate(rng), config)
    }

    pub fn with_key_pair(
        node_id: impl Into<NodeId>,
        key_pair: KeyPair,
        config: AuthenticatorConfig,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            key_pair,
            certificate: None,
            next_sequence: 1,
            replay_window: ReplayWindow::new(config.replay_window_depth),
            known_keys: HashMap::new(),
            group_key: None,
            config,
            metrics: AuthMetrics::default(),
        }
    }

    /// Require and attach a keyed-BLAKE3 tag on every message.
    pub fn with_group_key(mut self, key: MacKey) -> Self {
        self.group_key = Some(key);
        self
    }

    /// Replace the key pair. Any certificate for the old key is discarded.
    pub fn generate_keypair<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> PublicKey {
        self.key_pair = KeyPair::generate(rng);
        self.certificate = None;
        self.key_pair.public_key()
    }

    /// Issue a self-signed certificate for the current key, valid from `now`.
    pub fn issue_certificate(&mut self, now: Timestamp) -> &Certificate {
        let certificate = Certificate::self_issued(
            self.node_id.clone(),
            self.key_pair.public_key(),
            now,
            self.config.certificate_lifetime_ms,
        );
        self.certificate.insert(certificate)
    }

    pub fn set_certificate(&mut self, certificate: Certificate) {
        self.certificate = Some(certificate);
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }

    pub fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        self.key_pair.sign(bytes)
    }

    pub fn verify(bytes: &[u8], signature: &[u8], public_key: &PublicKey) -> bool {
        signing::verify(bytes, signature, public_key)
    }

    /// Remember a key for a sender that may later omit its certificate.
    pub fn register_key(&mut self, sender: impl Into<NodeId>, key: PublicKey) {
        self.known_keys.insert(sender.into(), key);
    }

    pub fn known_key(&self, sender: &str) -> Option<&PublicKey> {
        self.known_keys.get(sender)
    }

    pub fn hash_payload(&self, payload: &[u8]) -> PayloadHash {
        digest(self.config.digest, payload)
    }

    pub fn replay_window(&self) -> &ReplayWindow {
        &self.replay_window
    }

    pub fn metrics(&self) -> &AuthMetrics {
        &self.metrics
    }

    /// Sign `payload` at `now` with the next sequence number.
    pub fn create_secure_message(
        &mut self,
        payload: Vec<u8>,
        now: Timestamp,
    ) -> Result<SecureMessage, AuthError> {
        if payload.is_empty() {
            return Err(AuthError::EmptyPayload);
        }

        let sequence_number = self.next_sequence;
        self.next_sequence += 1;

        let blob = signed_blob(&payload, now, sequence_number);
        let signature = self.key_pair.sign(&blob);
        let mac = self.group_key.as_ref().map(|key| key.tag(&blob).to_vec());

        self.metrics.messages_created += 1;

        Ok(SecureMessage {
            sender: self.node_id.clone(),
            payload,
            signature,
            timestamp: now,
            sequence_number,
            sender_cert: self.certificate.clone(),
            mac,
        })
    }

    /// Binary accept/reject view of [`MessageAuthenticator::authenticate`].
    pub fn verify_secure_message(&mut self, message: &SecureMessage, now: Timestamp) -> bool {
        self.authenticate(message, now).is_ok()
    }

    /// Run every check, record accepted messages in the replay window, and
    /// report the narrow cause of a rejection.
    pub fn authenticate(
        &mut self,
        message: &SecureMessage,
        now: Timestamp,
    ) -> Result<(), AuthFailure> {
        match self.check(message, now) {
            Ok(public_key) => {
                let payload_hash = self.hash_payload(&message.payload);
                self.replay_window.record(
                    &message.sender,
                    ReplayEntry {
                        timestamp: message.timestamp,
                        sequence: message.sequence_number,
                        payload_hash,
                    },
                );
                if message.sender_cert.is_some() {
                    self.known_keys.insert(message.sender.clone(), public_key);
                }
                self.metrics.messages_accepted += 1;
                Ok(())
            }
            Err(failure) => {
                debug!(
                    node = %self.node_id,
                    sender = %message.sender,
                    sequence = message.sequence_number,
                    cause = ?failure,
                    "Dropping message"
                );
                self.metrics.record_failure(failure);
                Err(failure)
            }
        }
    }

    fn check(&self, message: &SecureMessage, now: Timestamp) -> Result<PublicKey, AuthFailure> {
        if now.abs_diff(message.timestamp) > self.config.freshness_tolerance_ms {
            return Err(AuthFailure::Stale);
        }

        let payload_hash = self.hash_payload(&message.payload);
        if self
            .replay_window
            .check(
                &message.sender,
                message.timestamp,
                message.sequence_number,
                &payload_hash,
            )
            .is_err()
        {
            return Err(AuthFailure::Replay);
        }

        let blob = message.signed_blob();

        if let Some(group_key) = &self.group_key {
            let tag_ok = message
                .mac
                .as_deref()
                .is_some_and(|tag| group_key.verify(&blob, tag));
            if !tag_ok {
                return Err(AuthFailure::BadMac);
            }
        }

        let public_key = match &message.sender_cert {
            Some(certificate) => {
                if !certificate.is_valid_at(now) || !certificate.certifies(&message.sender) {
                    return Err(AuthFailure::CertificateInvalid);
                }
                certificate.public_key
            }
            None => *self
                .known_keys
                .get(&message.sender)
                .ok_or(AuthFailure::UnknownSender)?,
        };

        if !signing::verify(&blob, &message.signature, &public_key) {
            return Err(AuthFailure::BadSignature);
        }

        Ok(public_key)
    }
}
