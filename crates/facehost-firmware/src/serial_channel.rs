//! [`UpdateChannel`] wired to a real [`SerialTransport`]: the firmware
//! engine's lines and raw block bytes go out over the same port the
//! command session uses, just at a raised baud rate and a line-oriented
//! rather than packet-framed protocol. The updater owns the port
//! exclusively for the duration of the update.

use std::time::Duration;

use facehost_transport::SerialTransport;

use crate::engine::UpdateChannel;
use crate::error::{FirmwareError, Result};

/// Per-write deadline; writes to a line-oriented text protocol are small
/// and should never legitimately take this long.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Adapts a [`SerialTransport`] to the engine's line/byte channel.
pub struct SerialUpdateChannel<'a> {
    transport: &'a SerialTransport,
}

impl<'a> SerialUpdateChannel<'a> {
    #[must_use]
    pub fn new(transport: &'a SerialTransport) -> Self {
        Self { transport }
    }
}

impl UpdateChannel for SerialUpdateChannel<'_> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write_bytes(&buf)?;

        // `dlspd <rate>` tells the device to raise its baud rate; raise
        // this side's to match immediately after the line goes out.
        if let Some(rate) = line.strip_prefix("dlspd ").and_then(|rest| rest.trim().parse().ok()) {
            self.transport.set_baud_rate(rate).map_err(|e| FirmwareError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write(data, WRITE_TIMEOUT).map_err(|e| FirmwareError::Transport(e.to_string()))
    }

    fn read_for(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = [0u8; 4096];
        match self.transport.read(&mut buf, timeout) {
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(facehost_transport::TransportError::Timeout) => Ok(Vec::new()),
            Err(e) => Err(FirmwareError::Transport(e.to_string())),
        }
    }
}
