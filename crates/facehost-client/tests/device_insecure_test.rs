//! Dispatcher integration tests against a simulated device, over an
//! in-memory transport rather than a real serial port.

use facehost_client::{Device, NoopCallbacks};
use facehost_harness::{memory_pair, ScriptedDevice, ScriptedReplies};
use facehost_license::LicenseKeyStore;
use facehost_proto::{Packet, PacketKind};

fn ok_result(seq: u16) -> Packet {
    Packet::new(PacketKind::Result, seq, vec![0u8])
}

#[test]
fn connect_then_authenticate_against_a_simulated_device() {
    let (host_port, device_port) = memory_pair("host", "device");
    let script = ScriptedReplies::new(vec![
        vec![Packet::new(PacketKind::DataReply, 0, vec![0u8])], // connect probe reply
        vec![ok_result(0)],                                     // authenticate reply
    ]);
    let _device = ScriptedDevice::spawn(device_port, script).expect("spawn simulated device");

    let transport = facehost_transport::SerialTransport::from_port(host_port).expect("wrap host port");
    let mut device = Device::insecure(LicenseKeyStore::new("acme"));
    device.attach(transport).expect("connect");

    let mut callbacks = NoopCallbacks;
    let result = device.authenticate(&mut callbacks).expect("authenticate");
    assert_eq!(result.status, facehost_client::StatusKind::Ok);
}
