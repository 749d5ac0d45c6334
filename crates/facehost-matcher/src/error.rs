use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum MatchError {
    #[error("probe and gallery faceprints versions differ")]
    VersionMismatch,

    #[error("descriptor contains an out-of-range feature value")]
    InvalidRange,

    #[error("vector length {len} exceeds the maximum of {max}")]
    VectorTooLong { len: usize, max: usize },

    #[error("gallery index {index} is out of range for an array of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot match against an empty gallery array")]
    EmptyGallery,
}
