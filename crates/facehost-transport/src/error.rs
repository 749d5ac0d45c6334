//! Transport-layer error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors produced while opening or driving the serial link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no read arrived within the deadline")]
    Timeout,

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("a read is already in progress on this port")]
    ConcurrentRead,
}

impl TransportError {
    /// Whether retrying the same operation might succeed, as opposed to a
    /// configuration or port-identity problem that will keep failing.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
