//! Node certificates.
//!
//! Certificate-authority chains are out of scope: a certificate is accepted
//! when its validity window covers the receiver's clock and its subject is
//! the declared sender. Its embedded key is then preferred for verification.

use crate::signing::PublicKey;
use serde::{Deserialize, Serialize};
use vanetsec_core::{NodeId, Timestamp};

/// Default lifetime of a self-issued certificate (one hour).
pub const DEFAULT_CERTIFICATE_LIFETIME_MS: Timestamp = 3_600_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Identity being certified
    pub subject: NodeId,
    /// Issuing identity (the subject itself for self-issued certificates)
    pub issuer: String,
    pub public_key: PublicKey,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
}

impl Certificate {
    pub fn self_issued(
        subject: impl Into<NodeId>,
        public_key: PublicKey,
        valid_from: Timestamp,
        lifetime_ms: Timestamp,
    ) -> Self {
        let subject = subject.into();
        Self {
            issuer: subject.clone(),
            subject,
            public_key,
            valid_from,
            valid_until: valid_from.saturating_add(lifetime_ms),
        }
    }

    /// `valid_from <= now <= valid_until`
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    pub fn certifies(&self, sender: &str) -> bool {
        self.subject == sender
    }
}
