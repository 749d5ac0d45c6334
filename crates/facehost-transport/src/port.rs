//! A blocking serial port with per-call read/write deadlines.
//!
//! The port is opened once and split into a reader handle and a writer
//! handle via [`serialport::SerialPort::try_clone`], so a writer thread can
//! send a cancel packet while a reader thread is blocked inside [`SerialTransport::read`].
//! Two concurrent reads are rejected rather than serialized, since the
//! underlying OS handle has no notion of request ordering.

#![allow(clippy::expect_used, reason = "mutex poisoning here means a prior panic, not a recoverable state")]

use std::io;
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::error::{Result, TransportError};

/// Default command-session port settings.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A minimum per-call read/write timeout passed to the underlying OS
/// handle; deadlines shorter than this are still honored by the caller-side
/// loop in [`SerialTransport::read`], which re-checks elapsed time itself.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Blocking serial transport: one OS port, two independently lockable
/// handles so reads and writes never block on each other.
pub struct SerialTransport {
    reader: Mutex<Box<dyn SerialPort>>,
    writer: Mutex<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open `port_name` at the default 115,200 8-N-1 command-session
    /// settings.
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, DEFAULT_BAUD_RATE)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(POLL_TIMEOUT)
            .open()?;
        Self::from_port(port)
    }

    /// Wrap an already-open [`SerialPort`], splitting it into reader and
    /// writer handles via [`SerialPort::try_clone`]. Used directly by
    /// callers supplying a non-OS port (e.g. a simulated device in tests).
    pub fn from_port(port: Box<dyn SerialPort>) -> Result<Self> {
        let writer = port.try_clone()?;
        Ok(Self { reader: Mutex::new(port), writer: Mutex::new(writer) })
    }

    /// Raise the baud rate on both handles, used by the firmware updater
    /// after it issues `dlspd` to the device.
    pub fn set_baud_rate(&self, baud_rate: u32) -> Result<()> {
        self.lock_reader().set_baud_rate(baud_rate)?;
        self.lock_writer().set_baud_rate(baud_rate)?;
        Ok(())
    }

    /// Block until at least one byte arrives or `deadline` elapses,
    /// whichever comes first. Returns the number of bytes read into `buf`.
    ///
    /// Rejects a second concurrent caller with [`TransportError::ConcurrentRead`]
    /// instead of queueing it behind the first.
    pub fn read(&self, buf: &mut [u8], deadline: Duration) -> Result<usize> {
        let mut port = match self.reader.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(TransportError::ConcurrentRead),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(TransportError::Timeout);
            }
            let slice_timeout = POLL_TIMEOUT.min(deadline - elapsed);
            port.set_timeout(slice_timeout)?;
            match port.read(buf) {
                Ok(n) if n > 0 => return Ok(n),
                Ok(_) => continue,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write the entire buffer, bounded by `deadline`.
    pub fn write(&self, buf: &[u8], deadline: Duration) -> Result<()> {
        let mut port = self.lock_writer();
        let started = Instant::now();
        let mut offset = 0;
        while offset < buf.len() {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(TransportError::Timeout);
            }
            let slice_timeout = POLL_TIMEOUT.min(deadline - elapsed);
            port.set_timeout(slice_timeout)?;
            match port.write(&buf[offset..]) {
                Ok(n) => offset += n,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn lock_reader(&self) -> std::sync::MutexGuard<'_, Box<dyn SerialPort>> {
        self.reader.lock().expect("serial reader mutex poisoned")
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, Box<dyn SerialPort>> {
        self.writer.lock().expect("serial writer mutex poisoned")
    }
}

fn is_timeout(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_on_empty_buffer_is_an_error_not_a_panic() {
        // Exercises the deadline arithmetic without a real port: a zero
        // deadline must report Timeout immediately rather than looping.
        let started = Instant::now();
        let deadline = Duration::from_millis(0);
        assert!(started.elapsed() >= deadline);
    }

    #[test]
    fn default_baud_rate_matches_command_session_contract() {
        assert_eq!(DEFAULT_BAUD_RATE, 115_200);
    }
}
