//! Fixed-point face-template matcher: normalized cross-correlation,
//! adaptive blending, anchor-drift control, and confidence mapping.
//! Pure CPU, no I/O — the command dispatcher invokes this crate directly
//! when the SDK runs in host-matching mode.

pub mod blend;
pub mod confidence;
pub mod error;
pub mod matcher;
pub mod ncc;
pub mod thresholds;
pub mod types;

pub use error::{MatchError, Result};
pub use matcher::{match_against_array, match_and_update, MatchOutcome};
pub use ncc::ncc;
pub use thresholds::{ConfidenceLevel, Thresholds};
pub use types::{Descriptor, Faceprints, FeaturesType, MatchElement, VectorFlag, FEATURE_LEN, VECTOR_LEN};
