//! Blocking serial transport: the bytes-in, bytes-out layer
//! underneath the packet codec and the firmware update engine's
//! line-oriented protocol.

pub mod error;
pub mod port;

pub use error::{Result, TransportError};
pub use port::{SerialTransport, DEFAULT_BAUD_RATE};
