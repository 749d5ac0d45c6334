//! Adaptive blending and anchor-drift limiting, grounded in
//! `Matcher.cc`'s `BlendAverageVector` / `LimitAdaptiveVector`.

use crate::ncc::ncc;
use crate::types::{Descriptor, FEATURE_LEN, MAX_FEATURE_VALUE, MIN_FEATURE_VALUE};

/// Blend weight: the existing vector counts for `W` parts, the new sample
/// for 1 part.
pub const BLEND_WEIGHT: i64 = 30;

/// Anchor-drift iteration caps:
/// "tuned for a specific feature distribution, not derivable from first
/// principles" — preserved verbatim as named constants.
pub const LIMIT_ITERS_NO_MASK: u32 = 6;
pub const LIMIT_ITERS_MASK: u32 = 10;

/// Round-half-away-from-zero integer division, used so fixed-point
/// blending doesn't silently bias toward zero the way truncating division
/// would.
fn round_div(num: i64, den: i64) -> i64 {
    debug_assert!(den > 0);
    let half = den / 2;
    if num >= 0 { (num + half) / den } else { (num - half) / den }
}

/// `target ← round((W·target + sample) / (W + 1))`, saturating each
/// feature element to `[MIN_FEATURE_VALUE, MAX_FEATURE_VALUE]`. Only the
/// first [`FEATURE_LEN`] elements are blended; the flag/reserved elements
/// of `target` are left untouched.
pub fn blend_toward(target: &mut Descriptor, sample: &Descriptor) {
    for i in 0..FEATURE_LEN {
        let num = BLEND_WEIGHT * i64::from(target[i]) + i64::from(sample[i]);
        let blended = round_div(num, BLEND_WEIGHT + 1);
        target[i] = blended.clamp(i64::from(MIN_FEATURE_VALUE), i64::from(MAX_FEATURE_VALUE)) as i16;
    }
}

/// Repeatedly blend `target` toward `anchor` until `NCC(target, anchor) >=
/// identical_threshold` or `max_iters` blends have been applied.
///
/// Returns `true` if the anchor constraint was satisfied (with or without
/// blending), `false` if the iteration cap was hit — the caller must then
/// abort the whole adaptive update.
pub fn limit_adaptive_vector(
    target: &mut Descriptor,
    anchor: &Descriptor,
    identical_threshold: u32,
    max_iters: u32,
) -> bool {
    for _ in 0..=max_iters {
        let score = ncc(&target[..FEATURE_LEN], &anchor[..FEATURE_LEN]).unwrap_or(0);
        if score >= identical_threshold {
            return true;
        }
        blend_toward(target, anchor);
    }
    ncc(&target[..FEATURE_LEN], &anchor[..FEATURE_LEN]).unwrap_or(0) >= identical_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VECTOR_LEN;

    #[test]
    fn blend_matches_worked_example() {
        // Worked example: gallery adaptive = [100]*512, probe = [100]*511 ++ [90].
        let mut target = [100i16; VECTOR_LEN];
        let mut sample = [100i16; VECTOR_LEN];
        sample[511] = 90;
        blend_toward(&mut target, &sample);
        assert_eq!(target[511], 100); // round((30*100 + 90) / 31) == 100
        assert_eq!(target[0], 100);
    }

    #[test]
    fn limiter_terminates_when_already_close() {
        let anchor = [100i16; VECTOR_LEN];
        let mut target = [100i16; VECTOR_LEN];
        assert!(limit_adaptive_vector(&mut target, &anchor, 4096, LIMIT_ITERS_NO_MASK));
    }

    #[test]
    fn limiter_gives_up_on_far_vector() {
        let anchor = [1000i16; VECTOR_LEN];
        let mut target = [-1000i16; VECTOR_LEN];
        // NCC(anchor, -anchor) is 0, and blending toward a vector you start
        // perfectly anti-correlated with cannot climb to "identical" inside
        // a handful of 1/31-weighted steps.
        let ok = limit_adaptive_vector(&mut target, &anchor, 4096, LIMIT_ITERS_NO_MASK);
        assert!(!ok);
    }

    #[test]
    fn round_div_rounds_half_away_from_zero() {
        assert_eq!(round_div(5, 2), 3);
        assert_eq!(round_div(-5, 2), -3);
        assert_eq!(round_div(4, 2), 2);
    }
}
