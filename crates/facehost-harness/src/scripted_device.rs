//! A background thread that answers packets according to a [`DeviceScript`],
//! standing in for the device side of a session.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use facehost_client::link::PacketLink;
use facehost_proto::Packet;
use facehost_transport::SerialTransport;
use serialport::SerialPort;

/// How a simulated device reacts to an inbound packet.
pub trait DeviceScript: Send {
    /// Produce zero or more reply packets for one inbound packet. Returning
    /// an empty vec drops the packet silently (used to simulate a lost
    /// reply or to wait for a later one in the same exchange).
    fn on_packet(&mut self, packet: &Packet) -> Vec<Packet>;
}

/// A scripted device running its `recv`/`on_packet`/`send` loop on its own
/// thread until told to stop or the link errors out (peer disconnected).
pub struct ScriptedDevice {
    handle: Option<JoinHandle<()>>,
    stop: mpsc::Sender<()>,
}

impl ScriptedDevice {
    /// Spawn a device thread that serves `script` over `port`, the far end
    /// of a [`memory_pair`](crate::memory_pair).
    pub fn spawn(port: Box<dyn SerialPort>, mut script: impl DeviceScript + 'static) -> std::io::Result<Self> {
        let transport = SerialTransport::from_port(port).map_err(std::io::Error::other)?;
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut link = PacketLink::new(transport);
            loop {
                if stop_rx.try_recv().is_ok() {
                    return;
                }
                let deadline = Instant::now() + Duration::from_millis(200);
                let packet = match link.recv(deadline) {
                    Ok(packet) => packet,
                    Err(_) => continue,
                };
                for reply in script.on_packet(&packet) {
                    let send_deadline = Instant::now() + Duration::from_secs(1);
                    if link.send(&reply, send_deadline).is_err() {
                        return;
                    }
                }
            }
        });
        Ok(Self { handle: Some(handle), stop: stop_tx })
    }
}

/// A [`DeviceScript`] that replies to each inbound packet with the next
/// pre-programmed batch of reply packets, in order. Once exhausted, further
/// inbound packets get no reply.
pub struct ScriptedReplies {
    batches: std::collections::VecDeque<Vec<Packet>>,
}

impl ScriptedReplies {
    /// `batches[i]` is sent back for the `i`th inbound packet.
    #[must_use]
    pub fn new(batches: Vec<Vec<Packet>>) -> Self {
        Self { batches: batches.into() }
    }
}

impl DeviceScript for ScriptedReplies {
    fn on_packet(&mut self, _packet: &Packet) -> Vec<Packet> {
        self.batches.pop_front().unwrap_or_default()
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use facehost_proto::PacketKind;

    use super::*;
    use crate::memory_pair;

    struct PingOk;

    impl DeviceScript for PingOk {
        fn on_packet(&mut self, packet: &Packet) -> Vec<Packet> {
            vec![Packet::new(PacketKind::DataReply, packet.seq, vec![0u8])]
        }
    }

    #[test]
    fn scripted_device_answers_a_ping() {
        let (host_port, device_port) = memory_pair("host", "device");
        let _device = ScriptedDevice::spawn(device_port, PingOk).expect("spawn device thread");

        let transport = SerialTransport::from_port(host_port).expect("wrap host port");
        let mut link = PacketLink::new(transport);
        let request = Packet::new(PacketKind::DataRequest, 0, vec![0u8]);
        let deadline = Instant::now() + Duration::from_secs(1);
        link.send(&request, deadline).expect("send ping");
        let reply = link.recv(deadline).expect("receive reply");
        assert_eq!(reply.kind, PacketKind::DataReply);
        assert_eq!(&reply.payload[..], &[0u8][..]);
    }
}
