//! Session-layer error type.

use thiserror::Error;

use crate::session::SessionState;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session state: cannot {operation} while {state:?}")]
    InvalidState { state: SessionState, operation: &'static str },

    #[error(transparent)]
    Protocol(#[from] facehost_proto::ProtocolError),

    /// Pairing or frame signature/decryption failure; fatal to the session.
    #[error("security error: {0}")]
    Security(#[from] facehost_crypto::CryptoError),

    #[error("peer sent a packet kind {0:?} not valid for the current session state")]
    UnexpectedKind(facehost_proto::PacketKind),
}
