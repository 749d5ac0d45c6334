//! Packet kind tags.

use crate::errors::ProtocolError;

/// The kind byte of a wire packet.
///
/// A plain `u8`-backed enum with explicit `to_u8`/`from_u8` rather than a
/// derive, since the wire value is a single byte and invalid values must
/// become a catchable error rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PacketKind {
    DataRequest,
    DataReply,
    /// Face-auth event stream (Hint/Progress/FaceDetected/Result share this
    /// envelope on the wire; the payload's first byte selects the event).
    Fa,
    /// Text command, used only by the firmware updater's line protocol.
    Cmd,
    Reply,
    Hint,
    Progress,
    Result,
    FaceDetected,
    LicenseRequest,
    LicenseReply,
    /// Out-of-band cancellation; may be sent while the read half is blocked.
    Cancel,
}

impl PacketKind {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::DataRequest => 0x01,
            Self::DataReply => 0x02,
            Self::Fa => 0x03,
            Self::Cmd => 0x04,
            Self::Reply => 0x05,
            Self::Hint => 0x06,
            Self::Progress => 0x07,
            Self::Result => 0x08,
            Self::FaceDetected => 0x09,
            Self::LicenseRequest => 0x0A,
            Self::LicenseReply => 0x0B,
            Self::Cancel => 0x0C,
        }
    }

    pub const fn from_u8(byte: u8) -> std::result::Result<Self, ProtocolError> {
        match byte {
            0x01 => Ok(Self::DataRequest),
            0x02 => Ok(Self::DataReply),
            0x03 => Ok(Self::Fa),
            0x04 => Ok(Self::Cmd),
            0x05 => Ok(Self::Reply),
            0x06 => Ok(Self::Hint),
            0x07 => Ok(Self::Progress),
            0x08 => Ok(Self::Result),
            0x09 => Ok(Self::FaceDetected),
            0x0A => Ok(Self::LicenseRequest),
            0x0B => Ok(Self::LicenseReply),
            0x0C => Ok(Self::Cancel),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let all = [
            PacketKind::DataRequest,
            PacketKind::DataReply,
            PacketKind::Fa,
            PacketKind::Cmd,
            PacketKind::Reply,
            PacketKind::Hint,
            PacketKind::Progress,
            PacketKind::Result,
            PacketKind::FaceDetected,
            PacketKind::LicenseRequest,
            PacketKind::LicenseReply,
            PacketKind::Cancel,
        ];
        for kind in all {
            assert_eq!(PacketKind::from_u8(kind.to_u8()), Ok(kind));
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        assert_eq!(PacketKind::from_u8(0xFF), Err(ProtocolError::UnknownKind(0xFF)));
    }
}
