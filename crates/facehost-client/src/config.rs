//! Device configuration options.

/// Camera mounting rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraRotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// How strictly the device enforces anti-spoof and mask tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    /// Reject masked faces; run every anti-spoof algorithm.
    High,
    /// Default: mask-tolerant.
    Medium,
    /// Recognition only, no anti-spoof.
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoMode {
    All,
    SpoofOnly,
    RecognitionOnly,
}

/// How many faces the device reports per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceSelectionPolicy {
    /// Nearest face only.
    Single,
    /// Up to 5 faces.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    Mjpeg1080p,
    Mjpeg720p,
    Raw10_1080p,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    None,
    CroppedFace,
    FullFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherConfidenceLevel {
    High,
    Medium,
    Low,
}

/// The full set of options `SetDeviceConfig`/`QueryDeviceConfig` exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub camera_rotation: CameraRotation,
    pub security_level: SecurityLevel,
    pub algo_mode: AlgoMode,
    pub face_selection_policy: FaceSelectionPolicy,
    pub preview_mode: PreviewMode,
    pub dump_mode: DumpMode,
    pub matcher_confidence_level: MatcherConfidenceLevel,
    /// Lockout counter before the device refuses authentication attempts
    /// without an explicit `Unlock`.
    pub max_spoofs: u8,
    pub gpio_auth_toggling: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            camera_rotation: CameraRotation::Deg0,
            security_level: SecurityLevel::Medium,
            algo_mode: AlgoMode::All,
            face_selection_policy: FaceSelectionPolicy::Single,
            preview_mode: PreviewMode::Mjpeg1080p,
            dump_mode: DumpMode::None,
            matcher_confidence_level: MatcherConfidenceLevel::High,
            max_spoofs: 20,
            gpio_auth_toggling: false,
        }
    }
}
