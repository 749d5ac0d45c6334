//! The public command dispatcher: one `Device` type
//! wiring the session, transport, matcher, and license sub-crates into the
//! full operation inventory.

pub mod callbacks;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod profile;
pub mod timeouts;
pub mod wire;

pub use callbacks::{FaceRect, FacesDetected, Hint, NoopCallbacks, OperationCallbacks, OperationResult, Pose};
pub use config::DeviceConfig;
pub use device::Device;
pub use error::{ClientError, Result, StatusKind};
pub use profile::LoopIntervals;
