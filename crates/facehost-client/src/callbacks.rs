//! The callback capability set: one trait with
//! default no-op methods rather than a family of per-operation callback
//! interfaces.

use crate::error::StatusKind;

/// Enrollment pose being requested of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pose {
    Center,
    Up,
    Down,
    Left,
    Right,
}

/// Transient, non-terminal condition surfaced during an operation (poor
/// lighting, face too far, etc). The exact code set is device-defined; the
/// dispatcher passes the raw byte through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint(pub u8);

/// One detected face's bounding box, in device pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// A `FaceDetected` event: zero to five rectangles plus a device timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacesDetected {
    pub rects: Vec<FaceRect>,
    pub timestamp_ms: u64,
}

/// The terminal outcome of an operation, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub status: StatusKind,
    /// Populated by `Authenticate`/`AuthenticateLoop` on a successful match.
    pub user_id: Option<String>,
}

/// User-supplied notification sink for a running operation. Every method
/// has a no-op default so callers only implement the events they care
/// about.
pub trait OperationCallbacks {
    fn on_progress(&mut self, _pose: Pose) {}
    fn on_hint(&mut self, _hint: Hint) {}
    fn on_faces_detected(&mut self, _faces: &FacesDetected) {}
    fn on_result(&mut self, _result: &OperationResult) {}
}

/// A callback set that observes nothing, for callers that only want the
/// final return value.
pub struct NoopCallbacks;

impl OperationCallbacks for NoopCallbacks {}
