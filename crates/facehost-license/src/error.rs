//! License-handshake error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LicenseError>;

/// Errors produced while fetching or persisting license state.
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("network error contacting the license server: {0}")]
    Network(String),

    #[error("license server returned HTTP {0}")]
    BadStatus(u16),

    #[error("license response was not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("license payload was not valid base64: {0}")]
    MalformedPayload(#[from] base64::DecodeError),

    #[error("license payload too large: got {got} bytes, max {max}")]
    PayloadTooLarge { got: usize, max: usize },

    #[error("no license key configured")]
    MissingKey,

    #[error("could not read or write the license key store: {0}")]
    Store(#[from] std::io::Error),
}
