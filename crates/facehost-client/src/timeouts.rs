//! Read timeouts used by callers.

use std::time::Duration;

pub const CONNECT_PROBE: Duration = Duration::from_secs(1);
pub const SIMPLE_REPLY: Duration = Duration::from_secs(3);
pub const ENROLLMENT_STEP: Duration = Duration::from_secs(10);
pub const AUTHENTICATION_STEP: Duration = Duration::from_secs(5);
/// Per 64 KiB of firmware block data sent; the firmware engine scales this
/// by block size itself.
pub const FIRMWARE_BLOCK_ACK_PER_64KIB: Duration = Duration::from_secs(2);
/// License server round trip.
pub const LICENSE_REQUEST: Duration = Duration::from_secs(10);
