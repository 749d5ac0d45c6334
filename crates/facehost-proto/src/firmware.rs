//! Firmware package wire layout, grounded
//! in `Utilities.cc`'s `UfifFile`/`UfifEntry` structs.
//!
//! This module only defines the on-disk layout and the allow-listed
//! module names; parsing, CRC reconciliation, and block partitioning live
//! in `facehost-firmware`, which depends on this crate the way the
//! dispatcher depends on `facehost-proto::packet`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// File-level header, fixed 32 bytes.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PackageHeader {
    sig: [u8; 4],
    ver: [u8; 2],
    entry_count: [u8; 2],
    otp_encrypt_version: u8,
    rsv: [u8; 23],
}

impl PackageHeader {
    pub const SIZE: usize = 32;
    /// `'UFHF'` read little-endian.
    pub const SIGNATURE: u32 = 0x4655_4846;
    /// File-offset alignment every module body starts at, grounded in
    /// `UFIF_ALIGN` in `Utilities.cc`.
    pub const BODY_ALIGN: u64 = 16;

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::PacketTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;
        if u32::from_le_bytes(header.sig) != Self::SIGNATURE {
            return Err(ProtocolError::PreambleMissing);
        }
        Ok(header)
    }

    #[must_use]
    pub const fn version(&self) -> u16 {
        u16::from_le_bytes(self.ver)
    }

    #[must_use]
    pub const fn entry_count(&self) -> u16 {
        u16::from_le_bytes(self.entry_count)
    }

    #[must_use]
    pub const fn otp_encrypt_version(&self) -> u8 {
        self.otp_encrypt_version
    }
}

/// Per-module table entry, fixed 80 bytes (`64 name + 4 size + 4 crc32 + 8 rsv`).
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PackageEntry {
    name: [u8; 64],
    size: [u8; 4],
    crc32: [u8; 4],
    rsv: [u8; 8],
}

impl PackageEntry {
    pub const SIZE: usize = 80;

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(bytes)
            .map(|(entry, _rest)| entry)
            .map_err(|_| ProtocolError::PacketTooShort { expected: Self::SIZE, actual: bytes.len() })
    }

    /// The NUL-padded module name, trimmed at the first NUL byte.
    #[must_use]
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        u32::from_le_bytes(self.size)
    }

    #[must_use]
    pub const fn crc32(&self) -> u32 {
        u32::from_le_bytes(self.crc32)
    }
}

/// Current-family module name allow-list.
pub const MODULE_NAMES_CURRENT: &[&str] = &[
    "OPFW", "NNLED", "NNLEDR", "DNET", "RECOG", "ACCNET", "YOLO", "AS2DLR", "ASDISP", "SPOOFS",
    "ASVIS", "BOOT",
];

/// Earlier device family's allow-list.
pub const MODULE_NAMES_LEGACY: &[&str] =
    &["OPFW", "NNLED", "NNLAS", "DNET", "RECOG", "YOLO", "AS2DLR"];

/// Module name reserved for the boot loader; must sort last in burn order.
pub const BOOT_MODULE_NAME: &str = "BOOT";

/// `SBC` is renamed to `OPFW` when building the on-wire module filename,
/// grounded in `Utilities.cc`.
#[must_use]
pub fn wire_module_name(package_name: &str) -> &str {
    if package_name == "SBC" { "OPFW" } else { package_name }
}

/// True if `name` appears in either the current or legacy allow-list.
#[must_use]
pub fn is_known_module_name(name: &str) -> bool {
    MODULE_NAMES_CURRENT.contains(&name) || MODULE_NAMES_LEGACY.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbc_renames_to_opfw() {
        assert_eq!(wire_module_name("SBC"), "OPFW");
        assert_eq!(wire_module_name("RECOG"), "RECOG");
    }

    #[test]
    fn allow_list_membership() {
        assert!(is_known_module_name("BOOT"));
        assert!(is_known_module_name("NNLAS"));
        assert!(!is_known_module_name("NOT_A_MODULE"));
    }

    #[test]
    fn entry_name_trims_at_nul() {
        let mut name = [0u8; 64];
        name[..4].copy_from_slice(b"BOOT");
        let entry = PackageEntry { name, size: 0u32.to_le_bytes(), crc32: 0u32.to_le_bytes(), rsv: [0; 8] };
        assert_eq!(entry.name(), "BOOT");
    }
}
