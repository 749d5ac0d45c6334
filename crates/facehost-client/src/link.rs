//! Framing glue between the byte-oriented transport and the packet codec:
//! encodes outbound [`Packet`]s, and accumulates inbound bytes with
//! resync-on-preamble until a full packet decodes.

use std::time::{Duration, Instant};

use facehost_proto::{scan_for_preamble, Packet};
use facehost_transport::SerialTransport;

use crate::error::{ClientError, Result};

/// Largest amount of unparsed bytes kept around waiting for a full packet.
const MAX_BUFFERED: usize = 1 << 20;

pub struct PacketLink {
    transport: SerialTransport,
    buffer: Vec<u8>,
}

impl PacketLink {
    #[must_use]
    pub fn new(transport: SerialTransport) -> Self {
        Self { transport, buffer: Vec::new() }
    }

    pub fn transport(&self) -> &SerialTransport {
        &self.transport
    }

    /// Encode and write `packet`, bounded by `deadline`.
    pub fn send(&self, packet: &Packet, deadline: Instant) -> Result<()> {
        let mut wire = Vec::new();
        packet.encode(&mut wire)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.transport.write(&wire, remaining)?;
        Ok(())
    }

    /// Read until one full packet decodes or `deadline` elapses.
    ///
    /// On a CRC mismatch or preamble miss the bad bytes are discarded and
    /// scanning resumes rather than surfacing the error to the caller
    /// immediately, unless the deadline runs out first.
    pub fn recv(&mut self, deadline: Instant) -> Result<Packet> {
        let mut read_buf = [0u8; 4096];
        loop {
            if let Some(skip) = self.try_decode()? {
                self.buffer.drain(..skip.1);
                return Ok(skip.0);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(facehost_transport::TransportError::Timeout.into());
            }
            let n = self.transport.read(&mut read_buf, remaining)?;
            self.buffer.extend_from_slice(&read_buf[..n]);
            if self.buffer.len() > MAX_BUFFERED {
                let overflow = self.buffer.len() - MAX_BUFFERED;
                self.buffer.drain(..overflow);
            }
        }
    }

    /// Try to decode one packet out of the current buffer, resyncing past
    /// any garbage or CRC failure. Returns `Some((packet, bytes_consumed))`
    /// on success, `None` if more bytes are needed.
    fn try_decode(&mut self) -> Result<Option<(Packet, usize)>> {
        loop {
            let skip = scan_for_preamble(&self.buffer);
            if skip > 0 {
                self.buffer.drain(..skip);
            }
            if self.buffer.is_empty() {
                return Ok(None);
            }

            match Packet::decode(&self.buffer) {
                Ok((packet, consumed)) => return Ok(Some((packet, consumed))),
                Err(facehost_proto::ProtocolError::FrameTruncated { .. })
                | Err(facehost_proto::ProtocolError::PacketTooShort { .. }) => return Ok(None),
                Err(facehost_proto::ProtocolError::PreambleMissing) => {
                    self.buffer.drain(..1);
                },
                Err(facehost_proto::ProtocolError::CrcMismatch { .. }) => {
                    self.buffer.drain(..1);
                },
                Err(e) => return Err(ClientError::from(e)),
            }
        }
    }
}
