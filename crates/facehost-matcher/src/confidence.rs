//! Score-to-confidence mapping, grounded in the
//! `RSID_LIN1_*`/`RSID_LIN2_*` macros in `MatcherImplDefines.h`.
//!
//! Two piecewise-linear segments, each computed in Q11 fixed point the
//! way the macros precompute `multiplier`/`additive` at compile time:
//! `confidence = (multiplier * (score - subtractive) + additive) >> HR`.

use crate::thresholds::Thresholds;

const CURVE_HR: i64 = 11;

struct LinearSegment {
    score_lo: i64,
    score_hi: i64,
    confidence_lo: i64,
    confidence_hi: i64,
}

impl LinearSegment {
    fn apply(&self, score: i64) -> i64 {
        let multiplier = ((self.confidence_hi - self.confidence_lo) << CURVE_HR)
            / (self.score_hi - self.score_lo);
        let additive = self.confidence_lo << CURVE_HR;
        (multiplier * (score - self.score_lo) + additive) >> CURVE_HR
    }
}

/// Map a match `score` to a `0..=100` confidence value using `thresholds`.
///
/// Below `update`, confidence is 0. Between `update` and `strong`,
/// confidence rises 60→95 (curve 2). Between `strong` and `identical`,
/// confidence rises 95→99 (curve 1). At or above `identical`, confidence
/// is capped at 99 (100 is never claimed without an exact match short-circuit
/// elsewhere).
#[must_use]
pub fn confidence(score: u32, thresholds: &Thresholds) -> u8 {
    let score = i64::from(score);
    let update = i64::from(thresholds.update_pnm_gnm);
    let strong = i64::from(thresholds.strong_pnm_gnm);
    let identical = i64::from(thresholds.identical_gnm_gnm);

    if score < update {
        return 0;
    }

    let value = if score >= strong {
        let curve1 = LinearSegment {
            score_lo: strong,
            score_hi: identical,
            confidence_lo: 95,
            confidence_hi: 99,
        };
        curve1.apply(score.min(identical))
    } else {
        let curve2 = LinearSegment {
            score_lo: update,
            score_hi: strong,
            confidence_lo: 60,
            confidence_hi: 95,
        };
        curve2.apply(score)
    };

    value.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_update_is_zero() {
        let t = Thresholds::for_level(crate::thresholds::ConfidenceLevel::High);
        assert_eq!(confidence(t.update_pnm_gnm - 1, &t), 0);
    }

    #[test]
    fn at_strong_is_95() {
        let t = Thresholds::for_level(crate::thresholds::ConfidenceLevel::High);
        assert_eq!(confidence(t.strong_pnm_gnm, &t), 95);
    }

    #[test]
    fn at_identical_is_99() {
        let t = Thresholds::for_level(crate::thresholds::ConfidenceLevel::High);
        assert_eq!(confidence(t.identical_gnm_gnm, &t), 99);
    }

    #[test]
    fn monotone_nondecreasing() {
        let t = Thresholds::for_level(crate::thresholds::ConfidenceLevel::High);
        let mut prev = 0u8;
        for score in (0..=4096u32).step_by(17) {
            let c = confidence(score, &t);
            assert!(c >= prev);
            prev = c;
        }
    }
}
