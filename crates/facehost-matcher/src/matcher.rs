//! Top-level match/update orchestration, grounded in
//! `Matcher::MatchFaceprintsToArray` and `GetScores`/`FaceMatch`.

use tracing::instrument;

use crate::blend::{blend_toward, limit_adaptive_vector, LIMIT_ITERS_MASK, LIMIT_ITERS_NO_MASK};
use crate::error::{MatchError, Result};
use crate::ncc::ncc;
use crate::thresholds::{resolve, MaskConfig, Thresholds};
use crate::types::{in_range, Descriptor, FeaturesType, MatchElement, VectorFlag, FEATURE_LEN};
use crate::Faceprints;

/// Outcome of matching one probe against one gallery template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub is_same: bool,
    pub score: u32,
    pub should_update: bool,
    pub confidence: u8,
}

fn select_gallery_descriptor(config: MaskConfig, gallery: &Faceprints) -> &Descriptor {
    match config {
        MaskConfig::ProbeNoMaskGalleryNoMask | MaskConfig::ProbeMaskGalleryNoMaskOnly => {
            &gallery.adaptive_without_mask
        }
        MaskConfig::ProbeMaskGalleryMask => &gallery.adaptive_with_mask,
    }
}

fn validate_pair(probe: &MatchElement, gallery: &Faceprints) -> Result<()> {
    if probe.version != gallery.version {
        return Err(MatchError::VersionMismatch);
    }
    if !in_range(&probe.vector) || !in_range(&gallery.adaptive_without_mask) {
        return Err(MatchError::InvalidRange);
    }
    if gallery.with_mask_flag() == VectorFlag::ValidWithMask && !in_range(&gallery.adaptive_with_mask)
    {
        return Err(MatchError::InvalidRange);
    }
    Ok(())
}

/// Match `probe` against a single `gallery` template and, if the update
/// rule fires, mutate `gallery`'s adaptive descriptors in place.
///
/// Covers scoring, the RGB-enrollment special case, the blend-toward-sample
/// step, and the anchor-drift limiter in one pass.
#[instrument(skip(probe, gallery, thresholds), fields(score))]
pub fn match_and_update(
    probe: &MatchElement,
    gallery: &mut Faceprints,
    thresholds: &Thresholds,
) -> Result<MatchOutcome> {
    validate_pair(probe, gallery)?;

    let probe_has_mask = probe.has_mask();
    let active = resolve(probe_has_mask, gallery, thresholds);
    let selected = select_gallery_descriptor(active.config, gallery);
    let score = ncc(&probe.vector[..FEATURE_LEN], &selected[..FEATURE_LEN])?;

    tracing::Span::current().record("score", score);

    let mut is_same = score > active.strong;
    // A score already at or above `identical` needs no adaptation: blending
    // a vector with itself is a no-op, so `should_update` stays false at
    // that point even though the bare `is_same && score >= update` formula
    // would say true.
    let mut should_update = is_same && score >= active.update && score < active.identical;

    // RGB-enrollment special case (`HandleThresholdsConfiguration`
    // rgb-enroll branch): a W10, no-mask probe scoring above the RGB-specific
    // strong threshold wholesale-replaces the gallery entry.
    if gallery.features_type == FeaturesType::Rgb
        && probe.features_type == FeaturesType::W10
        && !probe_has_mask
        && is_same
    {
        gallery.enrollment = probe.vector;
        gallery.adaptive_without_mask = probe.vector;
        gallery.adaptive_with_mask = [0i16; crate::types::VECTOR_LEN];
        gallery.features_type = FeaturesType::W10;
        should_update = true;
    } else if gallery.features_type == FeaturesType::Rgb && probe_has_mask {
        is_same = false;
        should_update = false;
    } else if should_update {
        apply_adaptive_update(probe_has_mask, gallery, &probe.vector, active.config, active.identical);
        should_update = true;
    }

    Ok(MatchOutcome {
        is_same,
        score,
        should_update,
        confidence: crate::confidence::confidence(score, thresholds),
    })
}

/// Apply the blend + anchor-drift-limit step for one of the three mask
/// configs.
fn apply_adaptive_update(
    probe_has_mask: bool,
    gallery: &mut Faceprints,
    probe_vector: &Descriptor,
    config: MaskConfig,
    identical_threshold: u32,
) {
    let (anchor, max_iters): (Descriptor, u32) = match config {
        MaskConfig::ProbeNoMaskGalleryNoMask => (gallery.enrollment, LIMIT_ITERS_NO_MASK),
        MaskConfig::ProbeMaskGalleryMask | MaskConfig::ProbeMaskGalleryNoMaskOnly => {
            (gallery.adaptive_without_mask, LIMIT_ITERS_MASK)
        }
    };

    debug_assert_eq!(probe_has_mask, !matches!(config, MaskConfig::ProbeNoMaskGalleryNoMask));

    let target = match config {
        MaskConfig::ProbeNoMaskGalleryNoMask => &mut gallery.adaptive_without_mask,
        MaskConfig::ProbeMaskGalleryMask => &mut gallery.adaptive_with_mask,
        MaskConfig::ProbeMaskGalleryNoMaskOnly => {
            // First mask observation: copy the probe in verbatim and flag it,
            // then treat adaptive_without_mask as the anchor as usual.
            gallery.adaptive_with_mask = *probe_vector;
            gallery.adaptive_with_mask[crate::types::FLAG_INDEX] = VectorFlag::ValidWithMask.to_raw();
            &mut gallery.adaptive_with_mask
        }
    };

    if !matches!(config, MaskConfig::ProbeMaskGalleryNoMaskOnly) {
        blend_toward(target, probe_vector);
    }

    // Anchor-drift limiter: if it can't converge within budget, undo by
    // leaving the post-blend value in place is wrong per spec ("abort the
    // update... return the unchanged gallery") — snapshot first.
    let mut candidate = *target;
    if limit_adaptive_vector(&mut candidate, &anchor, identical_threshold, max_iters) {
        *target = candidate;
    }
    // else: limiter exhausted, gallery's target keeps its pre-update value
    // because `target` was never written back from `candidate`.
}

/// Match `probe` against an array of gallery templates, pick the
/// highest-scoring one, then apply the single-template rules against it.
///
/// # Errors
///
/// `MatchError::EmptyGallery` if `gallery` is empty.
pub fn match_against_array(
    probe: &MatchElement,
    gallery: &mut [Faceprints],
    thresholds: &Thresholds,
) -> Result<(usize, MatchOutcome)> {
    if gallery.is_empty() {
        return Err(MatchError::EmptyGallery);
    }

    let mut best_index = 0usize;
    let mut best_score = None::<u32>;

    for (index, template) in gallery.iter().enumerate() {
        validate_pair(probe, template)?;
        let probe_has_mask = probe.has_mask();
        let active = resolve(probe_has_mask, template, thresholds);
        let selected = select_gallery_descriptor(active.config, template);
        let score = ncc(&probe.vector[..FEATURE_LEN], &selected[..FEATURE_LEN])?;
        if best_score.is_none_or(|b| score > b) {
            best_score = Some(score);
            best_index = index;
        }
    }

    let outcome = match_and_update(
        probe,
        gallery.get_mut(best_index).ok_or(MatchError::IndexOutOfRange {
            index: best_index,
            len: gallery.len(),
        })?,
        thresholds,
    )?;

    Ok((best_index, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::ConfidenceLevel;
    use crate::types::VECTOR_LEN;

    fn flat(value: i16) -> Descriptor {
        [value; VECTOR_LEN]
    }

    #[test]
    fn s1_enroll_then_authenticate_host_matching() {
        let gallery_vec = flat(100);
        let mut gallery = Faceprints {
            version: 9,
            features_type: FeaturesType::W10,
            flags: 0,
            enrollment: gallery_vec,
            adaptive_without_mask: gallery_vec,
            adaptive_with_mask: [0; VECTOR_LEN],
        };
        let probe = MatchElement { version: 9, features_type: FeaturesType::W10, flags: 0, vector: gallery_vec };

        let thresholds = Thresholds::for_level(ConfidenceLevel::High);
        let outcome = match_and_update(&probe, &mut gallery, &thresholds).unwrap();

        assert!(outcome.is_same);
        assert_eq!(outcome.score, 4096);
        assert!(!outcome.should_update); // score >= identical, so no adaptive step needed beyond contraction
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let gallery = Faceprints {
            version: 9,
            features_type: FeaturesType::W10,
            flags: 0,
            enrollment: flat(100),
            adaptive_without_mask: flat(100),
            adaptive_with_mask: [0; VECTOR_LEN],
        };
        let probe = MatchElement { version: 8, features_type: FeaturesType::W10, flags: 0, vector: flat(100) };
        let thresholds = Thresholds::for_level(ConfidenceLevel::High);
        let mut gallery = gallery;
        assert_eq!(match_and_update(&probe, &mut gallery, &thresholds), Err(MatchError::VersionMismatch));
    }

    #[test]
    fn empty_array_is_rejected() {
        let probe = MatchElement { version: 9, features_type: FeaturesType::W10, flags: 0, vector: flat(0) };
        let thresholds = Thresholds::for_level(ConfidenceLevel::High);
        let mut gallery: Vec<Faceprints> = Vec::new();
        assert_eq!(match_against_array(&probe, &mut gallery, &thresholds), Err(MatchError::EmptyGallery));
    }
}
