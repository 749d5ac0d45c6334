//! The license-request HTTP handshake.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::error::{LicenseError, Result};

/// `LICENSE_VERIFICATION_RES_SIZE + LICENSE_SIGNATURE_SIZE`: the largest
/// payload the device is prepared to accept in a `LicenseReply`.
pub const MAX_PAYLOAD_SIZE: usize = 64 + 384;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The `LicenseRequest` event body: IV, encrypted session token, and the
/// device's serial number.
pub struct LicenseRequest {
    pub iv: [u8; 16],
    pub encrypted_session_token: [u8; 16],
    pub serial_number: [u8; 28],
}

impl LicenseRequest {
    /// Parse the 60-byte event body the device sends.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() != 60 {
            return None;
        }
        let mut iv = [0u8; 16];
        let mut token = [0u8; 16];
        let mut serial = [0u8; 28];
        iv.copy_from_slice(&body[0..16]);
        token.copy_from_slice(&body[16..32]);
        serial.copy_from_slice(&body[32..60]);
        Some(Self { iv, encrypted_session_token: token, serial_number: serial })
    }

    /// The serial number with trailing NUL padding trimmed, as sent to the
    /// license server.
    fn serial_number_str(&self) -> String {
        let end = self.serial_number.iter().position(|&b| b == 0).unwrap_or(self.serial_number.len());
        String::from_utf8_lossy(&self.serial_number[..end]).into_owned()
    }
}

/// License type reported by the server, mirrored byte-for-byte from the
/// device-side enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseType {
    NoFeatures,
    AntiSpoofSubscription,
    FacialAuthSubscription,
    AntiSpoofRenewal,
    FacialAuthRenewal,
    AntiSpoofPerpetual,
    FacialAuthPerpetual,
    Unknown(i64),
}

impl From<i64> for LicenseType {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::NoFeatures,
            1 => Self::AntiSpoofSubscription,
            2 => Self::FacialAuthSubscription,
            3 => Self::AntiSpoofRenewal,
            4 => Self::FacialAuthRenewal,
            5 => Self::AntiSpoofPerpetual,
            6 => Self::FacialAuthPerpetual,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LicenseInfoResponse {
    license_type: i64,
    payload: String,
}

/// The decoded reply, ready to be sent back to the device as `LicenseReply`.
pub struct LicenseCheckResult {
    pub license_type: LicenseType,
    pub payload: Vec<u8>,
}

/// Talks to a single configured license endpoint.
pub struct LicenseClient {
    endpoint: String,
}

impl LicenseClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    /// Perform the GET handshake for one `LicenseRequest` event.
    pub fn check_license(&self, license_key: &str, request: &LicenseRequest) -> Result<LicenseCheckResult> {
        let mut bundle = Vec::with_capacity(32);
        bundle.extend_from_slice(&request.iv);
        bundle.extend_from_slice(&request.encrypted_session_token);
        let encoded_bundle = BASE64.encode(&bundle);

        let response = ureq::get(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .query("license_key", license_key)
            .query("serial_number", &request.serial_number_str())
            .query("encrypted_session_token", &encoded_bundle)
            .set("Accept", "application/json")
            .call();

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(LicenseError::BadStatus(code)),
            Err(ureq::Error::Transport(transport)) => return Err(LicenseError::Network(transport.to_string())),
        };

        let body = response.into_string().map_err(|e| LicenseError::Network(e.to_string()))?;
        let info: LicenseInfoResponse = serde_json::from_str(&body)?;
        let payload = BASE64.decode(info.payload)?;

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(LicenseError::PayloadTooLarge { got: payload.len(), max: MAX_PAYLOAD_SIZE });
        }

        Ok(LicenseCheckResult { license_type: info.license_type.into(), payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sixty_byte_request_body() {
        let mut body = vec![0u8; 60];
        body[0] = 0xAA;
        body[32] = b'S';
        body[33] = b'N';
        let request = LicenseRequest::parse(&body).unwrap();
        assert_eq!(request.iv[0], 0xAA);
        assert_eq!(request.serial_number_str(), "SN");
    }

    #[test]
    fn rejects_wrong_length_request_body() {
        assert!(LicenseRequest::parse(&[0u8; 59]).is_none());
        assert!(LicenseRequest::parse(&[0u8; 61]).is_none());
    }

    #[test]
    fn license_type_round_trips_known_values() {
        assert_eq!(LicenseType::from(0), LicenseType::NoFeatures);
        assert_eq!(LicenseType::from(6), LicenseType::FacialAuthPerpetual);
        assert_eq!(LicenseType::from(99), LicenseType::Unknown(99));
    }
}
