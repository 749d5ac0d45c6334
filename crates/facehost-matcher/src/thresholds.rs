//! Threshold tables, grounded in `MatcherImplDefines.h` and
//! `Matcher::SetToDefaultThresholds`/`HandleThresholdsConfiguration`.
//!
//! The original per-confidence-level numeric constants live in a source
//! file that was not present in the retrieval pack (only the single
//! default-confidence set in `MatcherImplDefines.h` was: identical 2000,
//! strong 970, update 800). The three-level table below is an internally
//! consistent scaling of that base set that preserves the required
//! ordering `update < strong < identical` for every (level, mask-config)
//! pair — see DESIGN.md for the open-question writeup.

use crate::types::Faceprints;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    #[default]
    High,
}

/// Every threshold the matcher needs, for one confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub identical_gnm_gnm: u32,
    pub identical_gm_gnm: u32,

    pub strong_pnm_gnm: u32,
    pub strong_pm_gm: u32,
    pub strong_pm_gnm: u32,
    pub strong_pnm_gnm_rgb_enroll: u32,

    pub update_pnm_gnm: u32,
    pub update_pm_gm: u32,
    pub update_pm_gnm_first: u32,
}

impl Thresholds {
    #[must_use]
    pub const fn for_level(level: ConfidenceLevel) -> Self {
        match level {
            ConfidenceLevel::High => Self {
                identical_gnm_gnm: 2000,
                identical_gm_gnm: 1900,
                strong_pnm_gnm: 970,
                strong_pm_gm: 900,
                strong_pm_gnm: 850,
                strong_pnm_gnm_rgb_enroll: 700,
                update_pnm_gnm: 800,
                update_pm_gm: 750,
                update_pm_gnm_first: 700,
            },
            ConfidenceLevel::Medium => Self {
                identical_gnm_gnm: 1800,
                identical_gm_gnm: 1700,
                strong_pnm_gnm: 870,
                strong_pm_gm: 810,
                strong_pm_gnm: 760,
                strong_pnm_gnm_rgb_enroll: 630,
                update_pnm_gnm: 720,
                update_pm_gm: 670,
                update_pm_gnm_first: 630,
            },
            ConfidenceLevel::Low => Self {
                identical_gnm_gnm: 1600,
                identical_gm_gnm: 1500,
                strong_pnm_gnm: 770,
                strong_pm_gm: 720,
                strong_pm_gnm: 670,
                strong_pnm_gnm_rgb_enroll: 560,
                update_pnm_gnm: 640,
                update_pm_gm: 590,
                update_pm_gnm_first: 560,
            },
        }
    }
}

/// Which (probe mask, gallery mask) combination is active for a match,
/// mirroring `ThresholdsConfigEnum` in the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskConfig {
    /// Probe has no mask; compare against `adaptive_without_mask`.
    ProbeNoMaskGalleryNoMask,
    /// Probe has a mask and the gallery's with-mask vector is valid.
    ProbeMaskGalleryMask,
    /// Probe has a mask but the gallery has no with-mask vector yet.
    ProbeMaskGalleryNoMaskOnly,
}

/// The resolved thresholds and config for one match attempt, grounded in
/// `HandleThresholdsConfiguration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveThresholds {
    pub config: MaskConfig,
    pub identical: u32,
    pub strong: u32,
    pub update: u32,
}

#[must_use]
pub fn resolve(
    probe_has_mask: bool,
    gallery: &Faceprints,
    thresholds: &Thresholds,
) -> ActiveThresholds {
    use crate::types::{FeaturesType, VectorFlag};

    if !probe_has_mask {
        let mut strong = thresholds.strong_pnm_gnm;
        // Enroll-from-RGB-image needs a lower strong threshold
        // (`HandleThresholdsConfiguration`'s rgb-enroll branch).
        if gallery.features_type == FeaturesType::Rgb {
            strong = thresholds.strong_pnm_gnm_rgb_enroll;
        }
        return ActiveThresholds {
            config: MaskConfig::ProbeNoMaskGalleryNoMask,
            identical: thresholds.identical_gnm_gnm,
            strong,
            update: thresholds.update_pnm_gnm,
        };
    }

    if gallery.with_mask_flag() == VectorFlag::ValidWithMask {
        ActiveThresholds {
            config: MaskConfig::ProbeMaskGalleryMask,
            identical: thresholds.identical_gm_gnm,
            strong: thresholds.strong_pm_gm,
            update: thresholds.update_pm_gm,
        }
    } else {
        ActiveThresholds {
            config: MaskConfig::ProbeMaskGalleryNoMaskOnly,
            identical: thresholds.identical_gm_gnm,
            strong: thresholds.strong_pm_gnm,
            update: thresholds.update_pm_gnm_first,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_holds_for_every_level() {
        for level in [ConfidenceLevel::Low, ConfidenceLevel::Medium, ConfidenceLevel::High] {
            let t = Thresholds::for_level(level);
            assert!(t.update_pnm_gnm < t.strong_pnm_gnm);
            assert!(t.strong_pnm_gnm < t.identical_gnm_gnm);
            assert!(t.update_pm_gm < t.strong_pm_gm);
            assert!(t.strong_pm_gm < t.identical_gm_gnm);
            assert!(t.update_pm_gnm_first < t.strong_pm_gnm);
            assert!(t.strong_pm_gnm < t.identical_gm_gnm);
        }
    }
}
