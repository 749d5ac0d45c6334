//! An in-memory stand-in for an OS serial port: two paired halves sharing a
//! pair of byte queues, implementing [`serialport::SerialPort`] so the rest
//! of the stack can treat it exactly like a real port.

use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

struct Queue {
    bytes: Mutex<Vec<u8>>,
    ready: Condvar,
}

impl Queue {
    fn new() -> Arc<Self> {
        Arc::new(Self { bytes: Mutex::new(Vec::new()), ready: Condvar::new() })
    }

    fn push(&self, data: &[u8]) {
        let mut guard = self.bytes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.extend_from_slice(data);
        self.ready.notify_all();
    }

    fn pop_some(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let guard = self.bytes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let deadline = Instant::now() + timeout;
        let mut guard = guard;
        while guard.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "memory port read timed out"));
            }
            let (next_guard, timeout_result) =
                self.ready.wait_timeout(guard, remaining).unwrap_or_else(std::sync::PoisonError::into_inner);
            guard = next_guard;
            if timeout_result.timed_out() && guard.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "memory port read timed out"));
            }
        }
        let n = buf.len().min(guard.len());
        buf[..n].copy_from_slice(&guard[..n]);
        guard.drain(..n);
        Ok(n)
    }
}

/// One end of an in-memory serial port pair.
pub struct MemoryPort {
    name: String,
    inbox: Arc<Queue>,
    outbox: Arc<Queue>,
    timeout: Duration,
}

/// Build a connected pair of ports: bytes written to one side's end are
/// read from the other's, and vice versa.
#[must_use]
pub fn memory_pair(name_a: &str, name_b: &str) -> (Box<dyn SerialPort>, Box<dyn SerialPort>) {
    let a_to_b = Queue::new();
    let b_to_a = Queue::new();
    let a = MemoryPort { name: name_a.to_string(), inbox: Arc::clone(&b_to_a), outbox: Arc::clone(&a_to_b), timeout: Duration::from_millis(50) };
    let b = MemoryPort { name: name_b.to_string(), inbox: a_to_b, outbox: b_to_a, timeout: Duration::from_millis(50) };
    (Box::new(a), Box::new(b))
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbox.pop_some(buf, self.timeout)
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbox.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialPort for MemoryPort {
    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn baud_rate(&self) -> serialport::Result<u32> {
        Ok(facehost_transport::DEFAULT_BAUD_RATE)
    }

    fn data_bits(&self) -> serialport::Result<DataBits> {
        Ok(DataBits::Eight)
    }

    fn flow_control(&self) -> serialport::Result<FlowControl> {
        Ok(FlowControl::None)
    }

    fn parity(&self) -> serialport::Result<Parity> {
        Ok(Parity::None)
    }

    fn stop_bits(&self) -> serialport::Result<StopBits> {
        Ok(StopBits::One)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> serialport::Result<()> {
        Ok(())
    }

    fn set_data_bits(&mut self, _data_bits: DataBits) -> serialport::Result<()> {
        Ok(())
    }

    fn set_flow_control(&mut self, _flow_control: FlowControl) -> serialport::Result<()> {
        Ok(())
    }

    fn set_parity(&mut self, _parity: Parity) -> serialport::Result<()> {
        Ok(())
    }

    fn set_stop_bits(&mut self, _stop_bits: StopBits) -> serialport::Result<()> {
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> serialport::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn write_request_to_send(&mut self, _level: bool) -> serialport::Result<()> {
        Ok(())
    }

    fn write_data_terminal_ready(&mut self, _level: bool) -> serialport::Result<()> {
        Ok(())
    }

    fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
        Ok(true)
    }

    fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
        Ok(true)
    }

    fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
        Ok(false)
    }

    fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
        Ok(true)
    }

    fn bytes_to_read(&self) -> serialport::Result<u32> {
        let guard = self.inbox.bytes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(u32::try_from(guard.len()).unwrap_or(u32::MAX))
    }

    fn bytes_to_write(&self) -> serialport::Result<u32> {
        Ok(0)
    }

    fn clear(&self, buffer_to_clear: ClearBuffer) -> serialport::Result<()> {
        match buffer_to_clear {
            ClearBuffer::Input => self.inbox.bytes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear(),
            ClearBuffer::Output => {},
            ClearBuffer::All => self.inbox.bytes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear(),
        }
        Ok(())
    }

    fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
        Ok(Box::new(MemoryPort {
            name: self.name.clone(),
            inbox: Arc::clone(&self.inbox),
            outbox: Arc::clone(&self.outbox),
            timeout: self.timeout,
        }))
    }

    fn set_break(&self) -> serialport::Result<()> {
        Ok(())
    }

    fn clear_break(&self) -> serialport::Result<()> {
        Ok(())
    }
}
