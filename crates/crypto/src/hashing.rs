//! Digest utility and the symmetric MAC scheme.
//!
//! Digests here are used for deduplication and integrity bookkeeping, not
//! for authentication. Authentication is the Ed25519 signature plus, when a
//! group key is configured, the keyed BLAKE3 tag.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 32-byte digest of a message payload.
pub type PayloadHash = [u8; 32];

/// Length of a MAC tag in bytes.
pub const MAC_TAG_LEN: usize = 32;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

/// Hash `data` with the chosen algorithm.
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> PayloadHash {
    match algorithm {
        DigestAlgorithm::Blake3 => *blake3::hash(data).as_bytes(),
        DigestAlgorithm::Sha256 => Sha256::digest(data).into(),
    }
}

/// Shared key for keyed-BLAKE3 message authentication codes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MacKey([u8; 32]);

impl MacKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a key from shared material under a context string.
    pub fn derive(context: &str, material: &[u8]) -> Self {
        Self(blake3::derive_key(context, material))
    }

    pub fn tag(&self, data: &[u8]) -> [u8; MAC_TAG_LEN] {
        *blake3::keyed_hash(&self.0, data).as_bytes()
    }

    /// Constant-time tag comparison.
    pub fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        let Ok(tag) = <[u8; MAC_TAG_LEN]>::try_from(tag) else {
            return false;
        };
        blake3::keyed_hash(&self.0, data) == blake3::Hash::from(tag)
    }
}

impl std::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MacKey(..)")
    }
}
