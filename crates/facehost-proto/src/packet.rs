//! Wire packet header and codec: `[0xA5 kind seq(LE) len(LE) payload
//! crc16(LE)]`.
//!
//! A small fixed header carries routing metadata, the payload is opaque
//! bytes, and the CRC trailer covers both: 6 bytes, little-endian.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use bytes::{BufMut, Bytes};

use crate::crc::crc16;
use crate::errors::{ProtocolError, Result};
use crate::kind::PacketKind;

/// Fixed 6-byte packet header, little-endian.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    preamble: u8,
    kind: u8,
    seq: [u8; 2],
    len: [u8; 2],
}

impl PacketHeader {
    pub const SIZE: usize = 6;
    pub const PREAMBLE: u8 = 0xA5;
    pub const MAX_PAYLOAD_SIZE: u16 = u16::MAX - (Self::SIZE as u16) - 2;

    #[must_use]
    pub const fn seq(&self) -> u16 {
        u16::from_le_bytes(self.seq)
    }

    #[must_use]
    pub const fn payload_len(&self) -> u16 {
        u16::from_le_bytes(self.len)
    }

    pub fn kind(&self) -> Result<PacketKind> {
        PacketKind::from_u8(self.kind)
    }

    /// Parse a header from the front of `bytes`, without consuming it.
    ///
    /// Does not check the preamble; callers that need resync-on-preamble
    /// scanning use [`scan_for_preamble`] first.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(bytes)
            .map(|(header, _rest)| header)
            .map_err(|_| ProtocolError::PacketTooShort { expected: Self::SIZE, actual: bytes.len() })
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        self.as_bytes().try_into().unwrap_or([0; Self::SIZE])
    }
}

/// A fully parsed or ready-to-send wire packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub seq: u16,
    pub payload: Bytes,
}

impl Packet {
    #[must_use]
    pub fn new(kind: PacketKind, seq: u16, payload: impl Into<Bytes>) -> Self {
        Self { kind, seq, payload: payload.into() }
    }

    /// Encode into `dst` as `[preamble kind seq len payload crc16]`.
    ///
    /// # Errors
    ///
    /// `ProtocolError::PayloadTooLarge` if the payload does not fit in the
    /// 16-bit length field (minus header/trailer overhead).
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let len = u16::try_from(self.payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            size: self.payload.len(),
            max: PacketHeader::MAX_PAYLOAD_SIZE as usize,
        })?;
        if len > PacketHeader::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: len as usize,
                max: PacketHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let header = PacketHeader {
            preamble: PacketHeader::PREAMBLE,
            kind: self.kind.to_u8(),
            seq: self.seq.to_le_bytes(),
            len: len.to_le_bytes(),
        };
        let header_bytes = header.to_bytes();

        let crc = crc16(&header_bytes);
        let crc = crc16_continue(crc, &self.payload);

        dst.put_slice(&header_bytes);
        dst.put_slice(&self.payload);
        dst.put_slice(&crc.to_le_bytes());

        Ok(())
    }

    /// Decode a packet that starts exactly at `bytes[0]` (the preamble byte
    /// must already be at the front — use [`scan_for_preamble`] to find it
    /// in an accumulated read buffer first).
    ///
    /// # Errors
    ///
    /// `PacketTooShort` if fewer than [`PacketHeader::SIZE`] bytes are
    /// available, `PreambleMissing` if the first byte is not `0xA5`,
    /// `FrameTruncated` if the payload + CRC trailer is not fully present,
    /// `CrcMismatch` if the trailing CRC-16 does not match, `UnknownKind`
    /// if the kind byte is not recognized.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let header = PacketHeader::from_bytes(bytes)?;
        if header.preamble != PacketHeader::PREAMBLE {
            return Err(ProtocolError::PreambleMissing);
        }

        let payload_len = header.payload_len() as usize;
        let total = PacketHeader::SIZE
            .checked_add(payload_len)
            .and_then(|n| n.checked_add(2))
            .ok_or(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: PacketHeader::MAX_PAYLOAD_SIZE as usize,
            })?;

        if bytes.len() < total {
            return Err(ProtocolError::FrameTruncated {
                expected: total,
                actual: bytes.len(),
            });
        }

        let kind = header.kind()?;
        let seq = header.seq();

        let payload_start = PacketHeader::SIZE;
        let payload_end = payload_start + payload_len;
        let payload = &bytes[payload_start..payload_end];

        let claimed = u16::from_le_bytes([bytes[payload_end], bytes[payload_end + 1]]);
        let computed = crc16_continue(crc16(&bytes[..PacketHeader::SIZE]), payload);
        if claimed != computed {
            return Err(ProtocolError::CrcMismatch { claimed, computed });
        }

        Ok((Self { kind, seq, payload: Bytes::copy_from_slice(payload) }, total))
    }
}

fn crc16_continue(initial: u16, data: &[u8]) -> u16 {
    crate::crc::crc16_update(initial, data)
}

/// Scan `buf` for the preamble byte, returning the number of leading bytes
/// to discard to resynchronize (0 if `buf` already starts with it, or
/// `buf.len()` if the preamble does not appear at all).
///
/// On any CRC failure or preamble miss, the caller discards bytes until
/// the next preamble rather than surfacing the error immediately.
#[must_use]
pub fn scan_for_preamble(buf: &[u8]) -> usize {
    buf.iter().position(|&b| b == PacketHeader::PREAMBLE).unwrap_or(buf.len())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    impl Arbitrary for Packet {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            (0u8..=0x0C, any::<u16>(), proptest::collection::vec(any::<u8>(), 0..512))
                .prop_map(|(kind_byte, seq, payload)| {
                    let kind = PacketKind::from_u8(kind_byte.max(1)).unwrap_or(PacketKind::Cmd);
                    Self::new(kind, seq, payload)
                })
                .boxed()
        }
    }

    proptest! {
        #[test]
        fn packet_round_trip(packet in any::<Packet>()) {
            let mut wire = Vec::new();
            packet.encode(&mut wire).expect("should encode");
            let (parsed, consumed) = Packet::decode(&wire).expect("should decode");
            prop_assert_eq!(consumed, wire.len());
            prop_assert_eq!(packet.kind, parsed.kind);
            prop_assert_eq!(packet.seq, parsed.seq);
            prop_assert_eq!(packet.payload, parsed.payload);
        }

        #[test]
        fn single_bit_flip_is_caught(packet in any::<Packet>(), bit_index in 0u32..64, flip_in_len in 0usize..1000) {
            let mut wire = Vec::new();
            packet.encode(&mut wire).expect("should encode");
            let flip_at = flip_in_len % wire.len().max(1);
            let bit = 1u8 << (bit_index % 8);
            wire[flip_at] ^= bit;

            let result = Packet::decode(&wire);
            prop_assert!(
                result.is_err(),
                "single-bit corruption must never silently decode to a different valid packet"
            );
        }
    }

    #[test]
    fn rejects_missing_preamble() {
        let bytes = [0x00u8, 0x01, 0, 0, 0, 0];
        assert_eq!(Packet::decode(&bytes), Err(ProtocolError::PreambleMissing));
    }

    #[test]
    fn rejects_truncated_payload() {
        let packet = Packet::new(PacketKind::Cmd, 1, vec![1, 2, 3, 4, 5]);
        let mut wire = Vec::new();
        packet.encode(&mut wire).unwrap();
        wire.truncate(wire.len() - 3);
        assert!(matches!(Packet::decode(&wire), Err(ProtocolError::FrameTruncated { .. })));
    }

    #[test]
    fn scan_finds_preamble_after_garbage() {
        let mut buf = vec![0x00, 0x11, 0x22];
        buf.push(PacketHeader::PREAMBLE);
        buf.extend_from_slice(&[1, 2, 3]);
        assert_eq!(scan_for_preamble(&buf), 3);
    }

    #[test]
    fn scan_returns_full_len_when_absent() {
        let buf = vec![0x00, 0x11, 0x22];
        assert_eq!(scan_for_preamble(&buf), buf.len());
    }
}
