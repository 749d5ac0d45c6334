//! Pairing, ECDH session-key agreement, and authenticated framing for the
//! secure session.
//!
//! ```text
//! Bootstrap key ──sign──> Pairing envelope ──verify──> Operational key
//!                                                           │
//! Ephemeral ECDH ──HKDF-SHA256──> Session key ─────────────>│
//!                                                           ▼
//!                                          SecureChannel (ChaCha20-Poly1305
//!                                          + ECDSA, monotonic counters)
//! ```

pub mod channel;
pub mod error;
pub mod session_key;
pub mod signing;

pub use channel::{SecureChannel, SecureFrame};
pub use error::{CryptoError, Result};
pub use session_key::EphemeralKeyPair;
pub use signing::{
    parse_verifying_key, sign_pairing_envelope, verify_pairing_envelope, PairingEnvelope,
    SigningKeyPair, PUBLIC_KEY_SIZE,
};

/// Re-exported so downstream crates can name the ECDSA key types without a
/// direct `p256` dependency of their own.
pub use p256::ecdsa::{SigningKey, VerifyingKey};
