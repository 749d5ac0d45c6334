//! Top-level error/status taxonomy: every public operation
//! collapses whatever sub-crate failed into one of these kinds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// The kind half of the error taxonomy, surfaced to callers even when
/// they only care about the coarse classification (e.g. "retry the whole
/// operation" vs. "re-pair").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ok,
    Error,
    SerialError,
    SecurityError,
    VersionMismatch,
    CrcError,
    LicenseError,
    LicenseCheck,
    NetworkError,
    TooManySpoofs,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("operation precondition failed: {0}")]
    InvalidArgument(String),

    #[error("device is not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] facehost_transport::TransportError),

    #[error(transparent)]
    Protocol(#[from] facehost_proto::ProtocolError),

    #[error(transparent)]
    Session(#[from] facehost_core::SessionError),

    #[error(transparent)]
    Security(#[from] facehost_crypto::CryptoError),

    #[error(transparent)]
    Match(#[from] facehost_matcher::MatchError),

    #[error(transparent)]
    License(#[from] facehost_license::LicenseError),

    #[error("firmware/host version mismatch")]
    VersionMismatch,

    #[error("device rejected the request: {0:?}")]
    DeviceResult(StatusKind),

    #[error("device is locked out after too many spoof attempts")]
    TooManySpoofs,
}

impl ClientError {
    /// Collapse this error into its coarse status kind.
    #[must_use]
    pub fn status_kind(&self) -> StatusKind {
        match self {
            Self::Transport(_) => StatusKind::SerialError,
            Self::Protocol(e) => match e {
                facehost_proto::ProtocolError::CrcMismatch { .. } => StatusKind::CrcError,
                _ => StatusKind::SerialError,
            },
            Self::Session(facehost_core::SessionError::Security(_))
            | Self::Session(facehost_core::SessionError::Protocol(
                facehost_proto::ProtocolError::CrcMismatch { .. },
            ))
            | Self::Security(_) => StatusKind::SecurityError,
            Self::Session(_) => StatusKind::Error,
            Self::Match(_) => StatusKind::Error,
            Self::License(facehost_license::LicenseError::Network(_)) => StatusKind::NetworkError,
            Self::License(_) => StatusKind::LicenseError,
            Self::VersionMismatch => StatusKind::VersionMismatch,
            Self::TooManySpoofs => StatusKind::TooManySpoofs,
            Self::InvalidArgument(_) | Self::NotConnected | Self::DeviceResult(_) => StatusKind::Error,
        }
    }
}
