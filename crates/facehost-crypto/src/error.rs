//! Crypto-layer error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("malformed key encoding")]
    KeyEncoding,

    #[error("pairing signature did not verify against the bootstrap key")]
    PairingSignatureInvalid,

    #[error("frame signature did not verify against the peer's paired key")]
    FrameSignatureInvalid,

    #[error("AEAD decryption failed (tampered ciphertext or wrong key)")]
    DecryptionFailed,

    #[error("replay counter went backwards: expected > {expected}, got {got}")]
    ReplayDetected { expected: u64, got: u64 },

    #[error("session counter exhausted, a new pairing is required")]
    CounterExhausted,

    #[error("ECDH agreement produced a low-order / identity point")]
    WeakSharedSecret,
}
