//! Line-oriented ASCII firmware update protocol, grounded in
//! `FwUpdateEngineF46x.cc`'s scan-buffer pattern
//! (`GetScanPtr`/`ConsumeScanned`).
//!
//! The device's responses are free-form ASCII with stable sentinel
//! tokens. Rather than matching a grammar, callers accumulate bytes into
//! a [`Scanner`] and ask it for a specific sentinel; once found, the
//! scanner drops everything up to and including the match so a later
//! scan never re-examines already-consumed bytes.

use crate::package::Block;

/// Accumulates device output and scans it for ASCII sentinels.
#[derive(Debug, Default)]
pub struct Scanner {
    buf: Vec<u8>,
}

impl Scanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Find the first occurrence of `needle`, and if present, drop
    /// everything up to and including the end of that line, returning the
    /// full matched line.
    pub fn consume_line_containing(&mut self, needle: &str) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        let pos = text.find(needle)?;
        let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
        let rel_end = text[pos..].find('\n');
        let line_end = rel_end.map_or(text.len(), |i| pos + i);
        let line = text[line_start..line_end].to_string();

        let consumed_bytes = rel_end.map_or(text.len(), |i| pos + i + 1);
        self.buf.drain(..consumed_bytes);
        Some(line)
    }

    /// True once `sentinel` has appeared anywhere in the unconsumed buffer
    /// (used for multi-line blocks like `dlinfo`'s `dlinfo end`).
    #[must_use]
    pub fn contains(&self, sentinel: &str) -> bool {
        String::from_utf8_lossy(&self.buf).contains(sentinel)
    }

    /// Drain and return the full buffer up to (not including) `sentinel`,
    /// plus the sentinel line itself; used to grab the whole `dlinfo`
    /// response body in one shot.
    pub fn consume_block_ending_with(&mut self, sentinel: &str) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        let pos = text.find(sentinel)?;
        let block_end = pos + sentinel.len();
        let block = text[..block_end].to_string();
        self.buf.drain(..block_end);
        Some(block)
    }
}

/// Per-block dirtiness, the result of reconciling a `dlinfo` response
/// against the host's own block CRC table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Clean,
    Dirty,
}

/// Parse a `dlinfo <name>` response body against the host's block table.
///
/// Grounded in `ParseDlResponse`: a bare `empty` response means the module
/// was never flashed (fully dirty); otherwise each `#<blkNo> <state>
/// <hdrCrc> <realCrc>` line is clean iff `state == "OK" && hdrCrc ==
/// realCrc && hdrCrc == host.blocks[blkNo].crc`. A block-count mismatch
/// between the response and `host_blocks` also marks the whole module
/// dirty.
#[must_use]
pub fn parse_dlinfo_response(body: &str, host_blocks: &[Block]) -> Vec<BlockState> {
    if body.contains("empty") {
        return vec![BlockState::Dirty; host_blocks.len()];
    }

    let mut seen = vec![None::<BlockState>; host_blocks.len()];
    for line in body.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('#') else { continue };
        let mut fields = rest.split_whitespace();
        let Some(block_no) = fields.next().and_then(|s| s.parse::<usize>().ok()) else { continue };
        let Some(state) = fields.next() else { continue };
        let Some(hdr_crc) = fields.next().and_then(|s| u32::from_str_radix(s, 16).ok()) else {
            continue;
        };
        let Some(real_crc) = fields.next().and_then(|s| u32::from_str_radix(s, 16).ok()) else {
            continue;
        };

        if block_no >= seen.len() {
            continue;
        }

        let host_crc = host_blocks[block_no].crc;
        let clean = state == "OK" && hdr_crc == real_crc && hdr_crc == host_crc;
        seen[block_no] = Some(if clean { BlockState::Clean } else { BlockState::Dirty });
    }

    if seen.iter().any(Option::is_none) {
        // Block-count mismatch: device reported fewer lines than the host
        // expects, so treat the whole module as dirty.
        return vec![BlockState::Dirty; host_blocks.len()];
    }

    seen.into_iter().map(|s| s.unwrap_or(BlockState::Dirty)).collect()
}

/// Per-block ack string the device sends right before accepting the raw
/// bytes: `"<file> : blk <n> sz=<sz>"`.
#[must_use]
pub fn block_ack_token(file: &str, block_no: usize, size: u32) -> String {
    format!("{file} : blk {block_no} sz={size}")
}

/// The `dl ret=<rc>` sentinel sent after a block transfer completes.
/// Returns the parsed `rc` if found.
#[must_use]
pub fn parse_dl_ret(line: &str) -> Option<i32> {
    line.split("dl ret=").nth(1)?.trim().split_whitespace().next()?.parse().ok()
}

/// Per-block ack wait timeout: `2000 * BlockSize / (64 * 1024)` ms.
#[must_use]
pub fn block_ack_timeout_ms(block_size: u32) -> u64 {
    2000u64 * u64::from(block_size) / (64 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(crc: u32) -> Block {
        Block { offset: 0, size: 1, crc }
    }

    #[test]
    fn empty_response_marks_all_dirty() {
        let blocks = vec![block(1), block(2)];
        assert_eq!(parse_dlinfo_response("empty\ndlinfo end\n", &blocks), vec![BlockState::Dirty; 2]);
    }

    #[test]
    fn s4_reconciliation_skips_clean_blocks() {
        let blocks = vec![block(0xAA), block(0xBB), block(0xCC)];
        let body = "#0 OK aa aa\n#1 OK bb cc\n#2 OK cc cc\ndlinfo end\n";
        let states = parse_dlinfo_response(body, &blocks);
        assert_eq!(states, vec![BlockState::Clean, BlockState::Dirty, BlockState::Clean]);
    }

    #[test]
    fn mismatched_block_count_marks_all_dirty() {
        let blocks = vec![block(0xAA), block(0xBB)];
        let body = "#0 OK aa aa\ndlinfo end\n";
        assert_eq!(parse_dlinfo_response(body, &blocks), vec![BlockState::Dirty; 2]);
    }

    #[test]
    fn scanner_consumes_up_to_match() {
        let mut scanner = Scanner::new();
        scanner.feed(b"garbage\ndl ret=0\nmore");
        let line = scanner.consume_line_containing("dl ret=").unwrap();
        assert_eq!(line, "dl ret=0");
        assert_eq!(String::from_utf8_lossy(&scanner.buf), "more");
    }

    #[test]
    fn parse_dl_ret_extracts_code() {
        assert_eq!(parse_dl_ret("dl ret=0"), Some(0));
        assert_eq!(parse_dl_ret("dl ret=-5"), Some(-5));
        assert_eq!(parse_dl_ret("no match here"), None);
    }

    #[test]
    fn block_ack_timeout_scales_with_size() {
        assert_eq!(block_ack_timeout_ms(64 * 1024), 2000);
        assert_eq!(block_ack_timeout_ms(512 * 1024), 16000);
    }
}
