//! The license handshake triggered when the device emits a
//! `LicenseRequest` event mid-session, plus license-key persistence.

pub mod client;
pub mod error;
pub mod store;

pub use client::{LicenseCheckResult, LicenseClient, LicenseRequest, LicenseType, MAX_PAYLOAD_SIZE};
pub use error::{LicenseError, Result};
pub use store::{LicenseKeyStore, LICENSE_KEY_LEN};
