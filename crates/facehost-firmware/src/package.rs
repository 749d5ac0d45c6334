//! Multi-module binary package parser, grounded in
//! `Utilities.cc`'s `UfifFile::Parse`.

use facehost_proto::crc::crc32;
use facehost_proto::firmware::{
    is_known_module_name, wire_module_name, PackageEntry, PackageHeader, BOOT_MODULE_NAME,
};

use crate::error::{FirmwareError, Result};

/// Block size used for reconciliation and streaming: 512 KiB, fixed.
pub const BLOCK_SIZE: u32 = 512 * 1024;
/// Module bodies are CRC-verified over a buffer zero-padded up to this
/// alignment.
const MODULE_CRC_ALIGN: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub offset: u32,
    pub size: u32,
    pub crc: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareModule {
    /// On-wire filename, after the `SBC` → `OPFW` rename.
    pub filename: String,
    pub file_offset: u64,
    pub total_size: u32,
    pub aligned_size: u32,
    pub module_name: String,
    pub whole_module_crc: u32,
    pub blocks: Vec<Block>,
    /// The module's raw body bytes, owned so the update engine can slice
    /// per-block payloads without re-reading the original package file.
    pub body: Vec<u8>,
}

impl FirmwareModule {
    #[must_use]
    pub fn is_boot(&self) -> bool {
        self.module_name == BOOT_MODULE_NAME
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Parse a complete firmware package image.
///
/// # Errors
///
/// See [`FirmwareError`] variants: malformed header/entries, unknown
/// module names, a misplaced `BOOT` module, or a
/// whole-module CRC mismatch.
pub fn parse_package(bytes: &[u8]) -> Result<Vec<FirmwareModule>> {
    let header = PackageHeader::from_bytes(bytes)?;
    let entry_count = header.entry_count() as usize;

    let mut entries = Vec::with_capacity(entry_count);
    let mut cursor = PackageHeader::SIZE;
    for _ in 0..entry_count {
        let entry = PackageEntry::from_bytes(&bytes[cursor..])?;
        entries.push(*entry);
        cursor += PackageEntry::SIZE;
    }

    for (index, entry) in entries.iter().enumerate() {
        let name = entry.name();
        if !is_known_module_name(&name) {
            return Err(FirmwareError::UnknownModuleName(name));
        }
        if name == BOOT_MODULE_NAME && index != entries.len() - 1 {
            return Err(FirmwareError::BootNotLast { index, count: entries.len() });
        }
    }

    let mut modules = Vec::with_capacity(entries.len());
    let mut body_offset = align_up(cursor as u64, PackageHeader::BODY_ALIGN);

    for entry in &entries {
        let size = entry.size();
        let end = body_offset
            .checked_add(u64::from(size))
            .ok_or(FirmwareError::BodyOutOfBounds { offset: body_offset, size, file_len: bytes.len() })?;
        if end > bytes.len() as u64 {
            return Err(FirmwareError::BodyOutOfBounds { offset: body_offset, size, file_len: bytes.len() });
        }

        let body = &bytes[body_offset as usize..end as usize];
        let module_name = entry.name();

        let aligned_size = align_up(u64::from(size), u64::from(MODULE_CRC_ALIGN)) as u32;
        let pad_len = (aligned_size - size) as usize;
        let mut padded = Vec::with_capacity(body.len() + pad_len);
        padded.extend_from_slice(body);
        padded.resize(padded.len() + pad_len, 0);

        let computed = crc32(&padded);
        if computed != entry.crc32() {
            return Err(FirmwareError::ModuleCrcMismatch {
                name: module_name,
                claimed: entry.crc32(),
                computed,
            });
        }

        let blocks = partition_blocks(body);

        modules.push(FirmwareModule {
            filename: wire_module_name(&module_name).to_string(),
            file_offset: body_offset,
            total_size: size,
            aligned_size,
            module_name,
            whole_module_crc: entry.crc32(),
            blocks,
            body: body.to_vec(),
        });

        body_offset = align_up(end, PackageHeader::BODY_ALIGN);
    }

    Ok(modules)
}

/// Split a module body into fixed-size blocks, CRC-32'd individually. The
/// final block is zero-padded to a 4-byte boundary before its CRC is
/// computed.
fn partition_blocks(body: &[u8]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut offset = 0u32;
    let mut remaining = body;

    while !remaining.is_empty() || blocks.is_empty() {
        let chunk_len = remaining.len().min(BLOCK_SIZE as usize);
        let chunk = &remaining[..chunk_len];
        let is_last = chunk_len == remaining.len();

        let crc = if is_last && chunk_len % 4 != 0 {
            let pad = 4 - (chunk_len % 4);
            let mut padded = chunk.to_vec();
            padded.resize(chunk_len + pad, 0);
            crc32(&padded)
        } else {
            crc32(chunk)
        };

        blocks.push(Block { offset, size: chunk_len as u32, crc });

        offset += chunk_len as u32;
        remaining = &remaining[chunk_len..];
        if is_last {
            break;
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_package(modules: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = vec![0u8; PackageHeader::SIZE];
        out[0..4].copy_from_slice(&PackageHeader::SIGNATURE.to_le_bytes());
        out[4..6].copy_from_slice(&1u16.to_le_bytes());
        out[6..8].copy_from_slice(&(modules.len() as u16).to_le_bytes());

        for (name, body) in modules {
            let mut entry = vec![0u8; PackageEntry::SIZE];
            entry[..name.len()].copy_from_slice(name.as_bytes());
            entry[64..68].copy_from_slice(&(body.len() as u32).to_le_bytes());

            let aligned = (body.len() as u32).div_ceil(MODULE_CRC_ALIGN) * MODULE_CRC_ALIGN;
            let mut padded = body.to_vec();
            padded.resize(aligned as usize, 0);
            let crc = crc32(&padded);
            entry[68..72].copy_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&entry);
        }

        for (_, body) in modules {
            while out.len() % PackageHeader::BODY_ALIGN as usize != 0 {
                out.push(0);
            }
            out.extend_from_slice(body);
        }

        out
    }

    #[test]
    fn parses_single_small_module() {
        let body = vec![0xABu8; 10];
        let bytes = build_package(&[("RECOG", &body)]);
        let modules = parse_package(&bytes).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].module_name, "RECOG");
        assert_eq!(modules[0].blocks.len(), 1);
        assert_eq!(modules[0].blocks[0].size, 10);
    }

    #[test]
    fn sbc_becomes_opfw_filename() {
        let bytes = build_package(&[("SBC", &[1, 2, 3])]);
        let modules = parse_package(&bytes).unwrap();
        assert_eq!(modules[0].filename, "OPFW");
        assert_eq!(modules[0].module_name, "SBC");
    }

    #[test]
    fn boot_must_be_last_s5() {
        let bytes = build_package(&[("BOOT", &[1]), ("OPFW", &[2])]);
        assert_eq!(
            parse_package(&bytes),
            Err(FirmwareError::BootNotLast { index: 0, count: 2 })
        );
    }

    #[test]
    fn unknown_module_name_rejected() {
        let bytes = build_package(&[("NOPE", &[1])]);
        assert!(matches!(parse_package(&bytes), Err(FirmwareError::UnknownModuleName(_))));
    }

    #[test]
    fn block_sizes_sum_to_module_size_p6() {
        let body = vec![0x11u8; (BLOCK_SIZE * 2 + 123) as usize];
        let bytes = build_package(&[("DNET", &body)]);
        let modules = parse_package(&bytes).unwrap();
        let total: u32 = modules[0].blocks.iter().map(|b| b.size).sum();
        assert_eq!(total, modules[0].total_size);
        assert_eq!(modules[0].blocks.len(), 3);
    }

    #[test]
    fn corrupted_body_fails_crc() {
        let body = vec![0x22u8; 100];
        let mut bytes = build_package(&[("RECOG", &body)]);
        let body_start = bytes.len() - 100;
        bytes[body_start] ^= 0xFF;
        assert!(matches!(parse_package(&bytes), Err(FirmwareError::ModuleCrcMismatch { .. })));
    }
}
