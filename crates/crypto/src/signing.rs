//! Node key pairs and Ed25519 signatures.
//!
//! # Security Model
//!
//! - Private keys never leave the [`KeyPair`]
//! - Signatures are deterministic for the same key and input
//! - Secret seed material is zeroized after key construction
//! - Verification never panics: malformed keys or signatures simply fail

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroize;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Errors that can occur while building keys.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid key length: {len} (expected {expected})")]
    InvalidKeyLength { len: usize, expected: usize },
}

/// Ed25519 public key as carried in certificates and key registries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SigningError> {
        let array: [u8; PUBLIC_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| SigningError::InvalidKeyLength {
                    len: bytes.len(),
                    expected: PUBLIC_KEY_LEN,
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Stable short identifier: first 16 bytes of the BLAKE3 hash, hex encoded.
    pub fn key_id(&self) -> String {
        let hash = blake3::hash(&self.0);
        hex::encode(&hash.as_bytes()[..16])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.key_id())
    }
}

/// A node's signing key pair.
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a key pair from the supplied RNG.
    ///
    /// Simulations pass a seeded RNG so identities are reproducible.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        let key_pair = Self::from_secret(&secret);
        secret.zeroize();
        key_pair
    }

    /// Build a key pair from 32 secret bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() != 32 {
            return Err(SigningError::InvalidKeyLength {
                len: bytes.len(),
                expected: 32,
            });
        }

        let mut secret = [0u8; 32];
        secret.copy_from_slice(bytes);
        let key_pair = Self::from_secret(&secret);
        secret.zeroize();
        Ok(key_pair)
    }

    fn from_secret(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let public_key = PublicKey(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn key_id(&self) -> String {
        self.public_key.key_id()
    }

    /// Sign arbitrary bytes and return the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature. Any malformed input yields `false`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify_strict(message, &signature).is_ok()
}
