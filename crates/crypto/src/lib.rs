//! Cryptographic primitives and message authentication for the VANET stack.
//!
//! # Core Capabilities
//!
//! - **Digital Signatures**: Ed25519 key pairs, signing, verification
//! - **Hash Functions**: parameterized digest utility (BLAKE3, SHA-256)
//! - **Message Authentication**: keyed BLAKE3 group MAC
//! - **Certificates**: validity-window checked node certificates
//! - **Replay Detection**: bounded per-sender replay window
//! - **Secure Messages**: signed envelopes created and verified by
//!   [`MessageAuthenticator`]
//!
//! # Security Principles
//!
//! - All protocol messages are signed
//! - All signatures are verified before any state changes
//! - Verification is fail-closed and never distinguishes causes to callers
//! - All time comparisons use the caller's logical clock

pub mod authenticator;
pub mod certificate;
pub mod hashing;
pub mod replay;
pub mod signing;

pub use authenticator::{
    signed_blob, AuthError, AuthFailure, AuthMetrics, AuthenticatorConfig, MessageAuthenticator,
    SecureMessage, DEFAULT_FRESHNESS_TOLERANCE_MS,
};
pub use certificate::{Certificate, DEFAULT_CERTIFICATE_LIFETIME_MS};
pub use hashing::{digest, DigestAlgorithm, MacKey, PayloadHash, MAC_TAG_LEN};
pub use replay::{ReplayEntry, ReplayError, ReplayWindow, DEFAULT_REPLAY_WINDOW_DEPTH};
pub use signing::{verify, KeyPair, PublicKey, SigningError, PUBLIC_KEY_LEN, SIGNATURE_LEN};
