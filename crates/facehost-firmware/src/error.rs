use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirmwareError>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FirmwareError {
    #[error(transparent)]
    Protocol(#[from] facehost_proto::ProtocolError),

    #[error("module name {0:?} is not in either device-family allow-list")]
    UnknownModuleName(String),

    #[error("BOOT module must be last in the package; found at index {index} of {count}")]
    BootNotLast { index: usize, count: usize },

    #[error("package declares module body past end of file: offset {offset}, size {size}, file len {file_len}")]
    BodyOutOfBounds { offset: u64, size: u32, file_len: usize },

    #[error("module {name:?} whole-module CRC mismatch: header claims {claimed:#010x}, computed {computed:#010x}")]
    ModuleCrcMismatch { name: String, claimed: u32, computed: u32 },

    #[error("device response did not contain expected sentinel {0:?}")]
    ProtocolSentinelMissing(&'static str),

    #[error("device reported error during update: {0}")]
    DeviceError(String),

    #[error("block transfer returned non-zero result code {0}")]
    BlockTransferFailed(i32),

    #[error("post-burn reconciliation still reports module {0:?} dirty")]
    PostBurnStillDirty(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation timed out waiting for device response")]
    Timeout,
}
