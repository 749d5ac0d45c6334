//! Protocol-layer error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing or deframing a wire packet.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolError {
    #[error("buffer too short for packet header: need {expected}, have {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("preamble byte missing, need resync")]
    PreambleMissing,

    #[error("payload length {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("frame truncated: expected {expected} payload bytes, have {actual}")]
    FrameTruncated { expected: usize, actual: usize },

    #[error("CRC-16 mismatch: header claims {claimed:#06x}, computed {computed:#06x}")]
    CrcMismatch { claimed: u16, computed: u16 },

    #[error("unknown packet kind byte {0:#04x}")]
    UnknownKind(u8),
}
