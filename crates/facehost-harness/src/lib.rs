//! A simulated device for dispatcher and session integration tests: an
//! in-memory serial port pair plus a scriptable responder thread, standing
//! in for a real face-auth module without needing OS serial hardware.

pub mod memory_port;
pub mod scripted_device;

pub use memory_port::memory_pair;
pub use scripted_device::{DeviceScript, ScriptedDevice, ScriptedReplies};
