//! Firmware package parsing and the stop-and-wait update engine.

pub mod engine;
pub mod error;
pub mod package;
pub mod serial_channel;
pub mod text_proto;

pub use engine::{FirmwareUpdateEngine, ModuleBurnReport, UpdateChannel};
pub use error::{FirmwareError, Result};
pub use package::{parse_package, Block, FirmwareModule, BLOCK_SIZE};
pub use serial_channel::SerialUpdateChannel;
pub use text_proto::{parse_dlinfo_response, BlockState, Scanner};
