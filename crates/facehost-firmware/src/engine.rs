//! Stop-and-wait update engine, grounded in
//! `FwUpdateEngineF46x::BurnModules`/`BurnSelectModules`/`FindDirtyModules`.
//!
//! Speaks the current-family (`F46x`) dialect: `dlinit <name> sz=<n>` /
//! `dl <name> <blkNo>`. The older family's session/version-qualified
//! `dlinit` and `dlact`-gated module boundaries are a distinct dialect the
//! original supports for backward compatibility; this engine targets the
//! current family only (see DESIGN.md).

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::{FirmwareError, Result};
use crate::package::FirmwareModule;
use crate::text_proto::{block_ack_timeout_ms, block_ack_token, parse_dl_ret, parse_dlinfo_response, BlockState, Scanner};

/// Everything the engine needs from the transport, kept abstract so tests
/// can substitute a scripted responder instead of real serial hardware.
/// The updater owns the port exclusively for the duration of an update.
pub trait UpdateChannel {
    fn write_line(&mut self, line: &str) -> Result<()>;
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;
    /// Block until at least one byte arrives or `timeout` elapses;
    /// returns whatever arrived (possibly empty on timeout).
    fn read_for(&mut self, timeout: Duration) -> Result<Vec<u8>>;
}

/// Per-module outcome, surfaced to the caller for progress UIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBurnReport {
    pub module_name: String,
    pub blocks_burned: usize,
    pub blocks_skipped: usize,
}

pub struct FirmwareUpdateEngine {
    modules: Vec<FirmwareModule>,
    force_full: bool,
    baud_rate: Option<u32>,
}

impl FirmwareUpdateEngine {
    #[must_use]
    pub fn new(modules: Vec<FirmwareModule>) -> Self {
        Self { modules, force_full: false, baud_rate: None }
    }

    /// Burn every module regardless of reconciliation, grounded in
    /// `BurnSelectModules`'s `force_full` parameter.
    #[must_use]
    pub fn force_full(mut self, force_full: bool) -> Self {
        self.force_full = force_full;
        self
    }

    #[must_use]
    pub fn raise_baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = Some(rate);
        self
    }

    /// Burn every module in package order, BOOT last, enforced again here
    /// even though the parser already checked it.
    ///
    /// # Errors
    ///
    /// Returns the first `FirmwareError` encountered; any error is fatal
    /// to the whole update attempt.
    #[instrument(skip(self, channel))]
    pub fn burn_modules(&self, channel: &mut dyn UpdateChannel) -> Result<Vec<ModuleBurnReport>> {
        if let Some(boot_index) = self.modules.iter().position(FirmwareModule::is_boot) {
            if boot_index != self.modules.len() - 1 {
                return Err(FirmwareError::BootNotLast { index: boot_index, count: self.modules.len() });
            }
        }

        if let Some(rate) = self.baud_rate {
            channel.write_line(&format!("dlspd {rate}"))?;
        }
        channel.write_line("dlclean")?;

        let mut reports = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            reports.push(self.burn_one_module(channel, module)?);
        }
        Ok(reports)
    }

    fn burn_one_module(
        &self,
        channel: &mut dyn UpdateChannel,
        module: &FirmwareModule,
    ) -> Result<ModuleBurnReport> {
        let states = self.reconcile(channel, module)?;
        let any_dirty = states.iter().any(|s| *s == BlockState::Dirty);

        if !any_dirty && !self.force_full {
            info!(module = %module.module_name, "module already clean, skipping burn");
            return Ok(ModuleBurnReport {
                module_name: module.module_name.clone(),
                blocks_burned: 0,
                blocks_skipped: module.blocks.len(),
            });
        }

        channel.write_line(&format!("dlinit {} sz={}", module.filename, module.total_size))?;
        let mut scanner = Scanner::new();
        wait_for_not_err(channel, &mut scanner, Duration::from_millis(50))?;

        let mut crc_table = Vec::with_capacity(module.blocks.len() * 4);
        for block in &module.blocks {
            crc_table.extend_from_slice(&block.crc.to_le_bytes());
        }
        channel.write_bytes(&crc_table)?;

        let mut burned = 0usize;
        let mut skipped = 0usize;
        for (index, block) in module.blocks.iter().enumerate() {
            if !self.force_full && states[index] == BlockState::Clean {
                skipped += 1;
                continue;
            }
            self.send_block(channel, module, index, block.offset, block.size)?;
            burned += 1;
        }

        let post = self.reconcile(channel, module)?;
        if post.iter().any(|s| *s == BlockState::Dirty) {
            return Err(FirmwareError::PostBurnStillDirty(module.module_name.clone()));
        }

        Ok(ModuleBurnReport { module_name: module.module_name.clone(), blocks_burned: burned, blocks_skipped: skipped })
    }

    fn reconcile(
        &self,
        channel: &mut dyn UpdateChannel,
        module: &FirmwareModule,
    ) -> Result<Vec<BlockState>> {
        channel.write_line(&format!("dlinfo {}", module.filename))?;

        let mut scanner = Scanner::new();
        let body = scan_until_block(channel, &mut scanner, "dlinfo end", Duration::from_secs(3))?;
        Ok(parse_dlinfo_response(&body, &module.blocks))
    }

    fn send_block(
        &self,
        channel: &mut dyn UpdateChannel,
        module: &FirmwareModule,
        index: usize,
        offset: u32,
        size: u32,
    ) -> Result<()> {
        channel.write_line(&format!("dl {} {index}", module.filename))?;

        let expected_ack = block_ack_token(&module.filename, index, size);
        let mut scanner = Scanner::new();
        let _ack = scan_until_line(channel, &mut scanner, &expected_ack, Duration::from_secs(2))?;

        let end = offset + size;
        let bytes = module.body.get(offset as usize..end as usize).ok_or(FirmwareError::BodyOutOfBounds {
            offset: u64::from(offset),
            size,
            file_len: module.body.len(),
        })?;
        channel.write_bytes(bytes)?;

        let timeout = Duration::from_millis(block_ack_timeout_ms(size));
        let rc_line = scan_until_line(channel, &mut scanner, "dl ret=", timeout)?;
        match parse_dl_ret(&rc_line) {
            Some(0) => Ok(()),
            Some(rc) => {
                warn!(module = %module.module_name, block = index, rc, "block transfer rejected");
                Err(FirmwareError::BlockTransferFailed(rc))
            }
            None => Err(FirmwareError::ProtocolSentinelMissing("dl ret=")),
        }
    }
}

fn wait_for_not_err(channel: &mut dyn UpdateChannel, scanner: &mut Scanner, timeout: Duration) -> Result<()> {
    let chunk = channel.read_for(timeout)?;
    scanner.feed(&chunk);
    if scanner.contains("err ") {
        return Err(FirmwareError::DeviceError(String::from_utf8_lossy(&chunk).into_owned()));
    }
    Ok(())
}

/// Scan for a multi-line block ending in `sentinel` (used for the
/// `dlinfo ... dlinfo end` response body).
fn scan_until_block(
    channel: &mut dyn UpdateChannel,
    scanner: &mut Scanner,
    sentinel: &str,
    timeout: Duration,
) -> Result<String> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Some(found) = scanner.consume_block_ending_with(sentinel) {
            return Ok(found);
        }
        if std::time::Instant::now() >= deadline {
            return Err(FirmwareError::Timeout);
        }
        let chunk = channel.read_for(Duration::from_millis(50))?;
        scanner.feed(&chunk);
    }
}

/// Scan for a single line containing `needle` (block ack, `dl ret=`).
fn scan_until_line(
    channel: &mut dyn UpdateChannel,
    scanner: &mut Scanner,
    needle: &str,
    timeout: Duration,
) -> Result<String> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Some(found) = scanner.consume_line_containing(needle) {
            return Ok(found);
        }
        if std::time::Instant::now() >= deadline {
            return Err(FirmwareError::Timeout);
        }
        let chunk = channel.read_for(Duration::from_millis(50))?;
        scanner.feed(&chunk);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::package::{parse_package, Block};

    struct ScriptedChannel {
        lines_written: Vec<String>,
        responses: VecDeque<Vec<u8>>,
    }

    impl UpdateChannel for ScriptedChannel {
        fn write_line(&mut self, line: &str) -> Result<()> {
            self.lines_written.push(line.to_string());
            Ok(())
        }
        fn write_bytes(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        fn read_for(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
            Ok(self.responses.pop_front().unwrap_or_default())
        }
    }

    fn module_with_blocks(crcs: &[u32]) -> FirmwareModule {
        FirmwareModule {
            filename: "RECOG".into(),
            file_offset: 0,
            total_size: crcs.len() as u32,
            aligned_size: 4096,
            module_name: "RECOG".into(),
            whole_module_crc: 0,
            blocks: crcs.iter().map(|&crc| Block { offset: 0, size: 1, crc }).collect(),
            body: vec![0u8; crcs.len()],
        }
    }

    #[test]
    fn s4_skips_clean_blocks_during_burn() {
        let module = module_with_blocks(&[0xAA, 0xBB, 0xCC]);
        let dlinfo_reply = b"#0 OK aa aa\n#1 OK bb cc\n#2 OK cc cc\ndlinfo end\n".to_vec();
        let dlinfo_reply_clean = b"#0 OK aa aa\n#1 OK bb bb\n#2 OK cc cc\ndlinfo end\n".to_vec();
        let mut channel = ScriptedChannel {
            lines_written: Vec::new(),
            responses: VecDeque::from([
                dlinfo_reply,                          // reconcile before burn
                b"".to_vec(),                           // dlinit ack-wait: no "err " present
                b"RECOG : blk 1 sz=1".to_vec(),          // per-block ack
                b"dl ret=0".to_vec(),                   // block transfer result
                dlinfo_reply_clean,                     // post-burn reconcile: all clean now
            ]),
        };

        let engine = FirmwareUpdateEngine::new(vec![module]);
        let report = engine.burn_one_module(&mut channel, &engine.modules[0]).unwrap();
        assert_eq!(report.blocks_burned, 1);
        assert_eq!(report.blocks_skipped, 2);
    }

    #[test]
    fn s5_boot_not_last_refuses_before_any_write() {
        let boot = module_with_blocks(&[1]);
        let mut boot = boot;
        boot.module_name = "BOOT".into();
        boot.filename = "BOOT".into();
        let opfw = module_with_blocks(&[2]);

        let engine = FirmwareUpdateEngine::new(vec![boot, opfw]);
        let mut channel =
            ScriptedChannel { lines_written: Vec::new(), responses: VecDeque::new() };
        let result = engine.burn_modules(&mut channel);
        assert!(matches!(result, Err(FirmwareError::BootNotLast { .. })));
        assert!(channel.lines_written.is_empty(), "no bytes must reach the device before the check");
    }

    #[test]
    fn parsed_package_blocks_sum_to_module_size() {
        let body = vec![0x55u8; 100];
        let mut bytes = vec![0u8; facehost_proto::firmware::PackageHeader::SIZE];
        bytes[0..4].copy_from_slice(&facehost_proto::firmware::PackageHeader::SIGNATURE.to_le_bytes());
        bytes[6..8].copy_from_slice(&1u16.to_le_bytes());
        let mut entry = vec![0u8; facehost_proto::firmware::PackageEntry::SIZE];
        entry[..5].copy_from_slice(b"RECOG");
        entry[64..68].copy_from_slice(&100u32.to_le_bytes());
        let crc = facehost_proto::crc32({
            let mut padded = body.clone();
            padded.resize(4096, 0);
            &padded
        });
        entry[68..72].copy_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&entry);
        while bytes.len() % 16 != 0 {
            bytes.push(0);
        }
        bytes.extend_from_slice(&body);

        let modules = parse_package(&bytes).unwrap();
        assert_eq!(modules[0].blocks[0].size, 100);
    }
}
