//! Command/event payload encoding.
//!
//! Only the packet header, firmware package, and firmware text protocol
//! are externally constrained; the command dispatcher's own payload layout
//! is this crate's choice, kept as a minimal tag-then-body scheme
//! consistent with the rest of the wire format's "fixed header, variable
//! body" shape.

use facehost_matcher::{Descriptor, Faceprints, FeaturesType, VECTOR_LEN};

use crate::callbacks::{FaceRect, FacesDetected, Hint, OperationResult, Pose};
use crate::config::{
    AlgoMode, CameraRotation, DeviceConfig, DumpMode, FaceSelectionPolicy, MatcherConfidenceLevel,
    PreviewMode, SecurityLevel,
};
use crate::error::StatusKind;

/// The first byte of every `DataRequest` body: which operation this
/// command packet invokes. The device needs this because every operation
/// shares the same packet kind; only the body distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Ping = 0,
    Pair = 1,
    SessionStart = 2,
    Enroll = 3,
    EnrollImage = 4,
    Authenticate = 5,
    RemoveUser = 6,
    RemoveAll = 7,
    SetDeviceConfig = 8,
    QueryDeviceConfig = 9,
    QueryUserIds = 10,
    QueryNumberOfUsers = 11,
    Standby = 12,
    Hibernate = 13,
    Unlock = 14,
    Unpair = 15,
    ExtractFaceprintsForEnroll = 16,
    ExtractFaceprintsForAuth = 17,
    GetUsersFaceprints = 18,
    SetUsersFaceprints = 19,
}

fn tagged(opcode: Opcode, capacity_hint: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(capacity_hint + 1);
    out.push(opcode as u8);
    out
}

fn encode_user_id(user_id: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(user_id.as_bytes());
    out.push(0);
}

/// Encode a no-argument request body tagged with `opcode`: `Ping`,
/// `RemoveAll`, `Authenticate`, `Standby`, `Hibernate`, `Unlock`, `Unpair`,
/// `QueryDeviceConfig`, `QueryUserIds`, `QueryNumberOfUsers`.
#[must_use]
pub fn opcode_only_body(opcode: Opcode) -> Vec<u8> {
    tagged(opcode, 0)
}

/// Encode a request body naming a single user, for `Enroll`,
/// `RemoveUser`, `ExtractFaceprintsForEnroll`, `ExtractFaceprintsForAuth`,
/// and `GetUsersFaceprints`.
#[must_use]
pub fn user_id_body(opcode: Opcode, user_id: &str) -> Vec<u8> {
    let mut out = tagged(opcode, user_id.len() + 1);
    encode_user_id(user_id, &mut out);
    out
}

/// Encode `EnrollImage`'s body: user id, frame dimensions, raw RGB bytes.
#[must_use]
pub fn enroll_image_body(user_id: &str, width: u16, height: u16, rgb: &[u8]) -> Vec<u8> {
    let mut out = tagged(Opcode::EnrollImage, user_id.len() + 5 + rgb.len());
    encode_user_id(user_id, &mut out);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(rgb);
    out
}

fn config_byte(value: u8) -> u8 {
    value
}

/// Encode a [`DeviceConfig`] for `SetDeviceConfig`.
#[must_use]
pub fn device_config_body(config: &DeviceConfig) -> Vec<u8> {
    let mut out = tagged(Opcode::SetDeviceConfig, 9);
    out.extend_from_slice(&[
        config_byte(match config.camera_rotation {
            CameraRotation::Deg0 => 0,
            CameraRotation::Deg90 => 1,
            CameraRotation::Deg180 => 2,
            CameraRotation::Deg270 => 3,
        }),
        config_byte(match config.security_level {
            SecurityLevel::High => 0,
            SecurityLevel::Medium => 1,
            SecurityLevel::Low => 2,
        }),
        config_byte(match config.algo_mode {
            AlgoMode::All => 0,
            AlgoMode::SpoofOnly => 1,
            AlgoMode::RecognitionOnly => 2,
        }),
        config_byte(match config.face_selection_policy {
            FaceSelectionPolicy::Single => 0,
            FaceSelectionPolicy::All => 1,
        }),
        config_byte(match config.preview_mode {
            PreviewMode::Mjpeg1080p => 0,
            PreviewMode::Mjpeg720p => 1,
            PreviewMode::Raw10_1080p => 2,
        }),
        config_byte(match config.dump_mode {
            DumpMode::None => 0,
            DumpMode::CroppedFace => 1,
            DumpMode::FullFrame => 2,
        }),
        config_byte(match config.matcher_confidence_level {
            MatcherConfidenceLevel::High => 0,
            MatcherConfidenceLevel::Medium => 1,
            MatcherConfidenceLevel::Low => 2,
        }),
        config.max_spoofs,
        u8::from(config.gpio_auth_toggling),
    ]);
    out
}

/// Decode a `QueryDeviceConfig` reply body back into a [`DeviceConfig`].
#[must_use]
pub fn decode_device_config(body: &[u8]) -> Option<DeviceConfig> {
    if body.len() < 9 {
        return None;
    }
    Some(DeviceConfig {
        camera_rotation: match body[0] {
            0 => CameraRotation::Deg0,
            1 => CameraRotation::Deg90,
            2 => CameraRotation::Deg180,
            _ => CameraRotation::Deg270,
        },
        security_level: match body[1] {
            0 => SecurityLevel::High,
            1 => SecurityLevel::Medium,
            _ => SecurityLevel::Low,
        },
        algo_mode: match body[2] {
            0 => AlgoMode::All,
            1 => AlgoMode::SpoofOnly,
            _ => AlgoMode::RecognitionOnly,
        },
        face_selection_policy: match body[3] {
            0 => FaceSelectionPolicy::Single,
            _ => FaceSelectionPolicy::All,
        },
        preview_mode: match body[4] {
            0 => PreviewMode::Mjpeg1080p,
            1 => PreviewMode::Mjpeg720p,
            _ => PreviewMode::Raw10_1080p,
        },
        dump_mode: match body[5] {
            0 => DumpMode::None,
            1 => DumpMode::CroppedFace,
            _ => DumpMode::FullFrame,
        },
        matcher_confidence_level: match body[6] {
            0 => MatcherConfidenceLevel::High,
            1 => MatcherConfidenceLevel::Medium,
            _ => MatcherConfidenceLevel::Low,
        },
        max_spoofs: body[7],
        gpio_auth_toggling: body[8] != 0,
    })
}

/// Decode a `Progress` event payload.
#[must_use]
pub fn decode_progress(body: &[u8]) -> Option<Pose> {
    match body.first()? {
        0 => Some(Pose::Center),
        1 => Some(Pose::Up),
        2 => Some(Pose::Down),
        3 => Some(Pose::Left),
        4 => Some(Pose::Right),
        _ => None,
    }
}

/// Decode a `Hint` event payload.
#[must_use]
pub fn decode_hint(body: &[u8]) -> Option<Hint> {
    body.first().copied().map(Hint)
}

/// Decode a `FaceDetected` event payload: `count(1) + count*(x,y,w,h: u16
/// LE) + timestamp_ms(u64 LE)`.
#[must_use]
pub fn decode_faces_detected(body: &[u8]) -> Option<FacesDetected> {
    let count = usize::from(*body.first()?);
    let rects_end = 1 + count * 8;
    if body.len() < rects_end + 8 {
        return None;
    }
    let mut rects = Vec::with_capacity(count);
    for i in 0..count {
        let base = 1 + i * 8;
        let field = |off: usize| u16::from_le_bytes([body[base + off], body[base + off + 1]]);
        rects.push(FaceRect { x: field(0), y: field(2), width: field(4), height: field(6) });
    }
    let ts_bytes: [u8; 8] = body[rects_end..rects_end + 8].try_into().ok()?;
    Some(FacesDetected { rects, timestamp_ms: u64::from_le_bytes(ts_bytes) })
}

fn status_kind_from_byte(byte: u8) -> StatusKind {
    match byte {
        0 => StatusKind::Ok,
        1 => StatusKind::SerialError,
        2 => StatusKind::SecurityError,
        3 => StatusKind::VersionMismatch,
        4 => StatusKind::CrcError,
        5 => StatusKind::LicenseError,
        6 => StatusKind::LicenseCheck,
        7 => StatusKind::NetworkError,
        8 => StatusKind::TooManySpoofs,
        _ => StatusKind::Error,
    }
}

/// Decode a `Result` event payload: `status(1) + optional NUL-terminated
/// user id`.
#[must_use]
pub fn decode_result(body: &[u8]) -> Option<OperationResult> {
    let status = status_kind_from_byte(*body.first()?);
    let user_id = body.get(1..).and_then(|rest| {
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        if end == 0 { None } else { Some(String::from_utf8_lossy(&rest[..end]).into_owned()) }
    });
    Some(OperationResult { status, user_id })
}

/// Decode a `QueryUserIds` reply: NUL-separated UTF-8 user ids.
#[must_use]
pub fn decode_user_ids(body: &[u8]) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Decode a `QueryNumberOfUsers` reply: a little-endian `u32` count.
#[must_use]
pub fn decode_user_count(body: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = body.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Encode a [`Faceprints`] record for `SetUsersFaceprints`.
#[must_use]
pub fn encode_faceprints(user_id: &str, faceprints: &Faceprints) -> Vec<u8> {
    let mut out = tagged(Opcode::SetUsersFaceprints, user_id.len() + 1 + 8 + VECTOR_LEN * 3 * 2);
    encode_user_id(user_id, &mut out);
    out.extend_from_slice(&faceprints.version.to_le_bytes());
    out.push(match faceprints.features_type {
        FeaturesType::W10 => 0,
        FeaturesType::Rgb => 1,
    });
    out.extend_from_slice(&faceprints.flags.to_le_bytes());
    for descriptor in [&faceprints.enrollment, &faceprints.adaptive_without_mask, &faceprints.adaptive_with_mask] {
        for &element in descriptor.iter() {
            out.extend_from_slice(&element.to_le_bytes());
        }
    }
    out
}

/// Decode a `GetUsersFaceprints` reply body back into a [`Faceprints`].
#[must_use]
pub fn decode_faceprints(body: &[u8]) -> Option<Faceprints> {
    let mut offset = 2;
    let version = u16::from_le_bytes(body.get(0..2)?.try_into().ok()?);
    let features_type = match *body.get(offset)? {
        0 => FeaturesType::W10,
        _ => FeaturesType::Rgb,
    };
    offset += 1;
    let flags = u32::from_le_bytes(body.get(offset..offset + 4)?.try_into().ok()?);
    offset += 4;

    let mut read_descriptor = || -> Option<Descriptor> {
        let mut out = [0i16; VECTOR_LEN];
        for slot in &mut out {
            let bytes: [u8; 2] = body.get(offset..offset + 2)?.try_into().ok()?;
            *slot = i16::from_le_bytes(bytes);
            offset += 2;
        }
        Some(out)
    };

    let enrollment = read_descriptor()?;
    let adaptive_without_mask = read_descriptor()?;
    let adaptive_with_mask = read_descriptor()?;

    Some(Faceprints { version, features_type, flags, enrollment, adaptive_without_mask, adaptive_with_mask })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_body_is_nul_terminated_after_opcode() {
        let body = user_id_body(Opcode::Enroll, "alice");
        assert_eq!(body[0], Opcode::Enroll as u8);
        assert_eq!(&body[1..], b"alice\0");
    }

    #[test]
    fn device_config_round_trips() {
        let config = DeviceConfig { max_spoofs: 7, gpio_auth_toggling: true, ..DeviceConfig::default() };
        let body = device_config_body(&config);
        assert_eq!(body[0], Opcode::SetDeviceConfig as u8);
        assert_eq!(decode_device_config(&body[1..]), Some(config));
    }

    #[test]
    fn faces_detected_round_trips_two_rects() {
        let mut body = vec![2u8];
        body.extend_from_slice(&10u16.to_le_bytes());
        body.extend_from_slice(&20u16.to_le_bytes());
        body.extend_from_slice(&30u16.to_le_bytes());
        body.extend_from_slice(&40u16.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&3u16.to_le_bytes());
        body.extend_from_slice(&4u16.to_le_bytes());
        body.extend_from_slice(&1_000u64.to_le_bytes());

        let decoded = decode_faces_detected(&body).unwrap();
        assert_eq!(decoded.rects.len(), 2);
        assert_eq!(decoded.timestamp_ms, 1_000);
    }

    #[test]
    fn result_with_user_id_round_trips() {
        let mut body = vec![0u8];
        body.extend_from_slice(b"alice\0");
        let result = decode_result(&body).unwrap();
        assert_eq!(result.status, StatusKind::Ok);
        assert_eq!(result.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn result_without_user_id_is_none() {
        let result = decode_result(&[0u8]).unwrap();
        assert_eq!(result.user_id, None);
    }
}
