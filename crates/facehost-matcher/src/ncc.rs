//! Fixed-point normalized cross-correlation, grounded in
//! `Matcher.cc`'s `MatchTwoVectors` / `GetMsb`.
//!
//! All-integer: no floating point anywhere in the score path, so results
//! are bit-for-bit reproducible across platforms.

use crate::error::{MatchError, Result};
use crate::types::FEATURE_LEN;

/// Top of the score range: `NCC` always returns a value in
/// `[0, MAX_SCORE]`.
pub const MAX_SCORE: u32 = 4096;

/// `GetMsb` in the original: the bit-length of `x`, i.e. `0` for `x == 0`
/// and `u64::BITS - x.leading_zeros()` otherwise. Kept as a private helper,
/// not public API.
const fn bit_length(x: u64) -> u32 {
    u64::BITS - x.leading_zeros()
}

/// Normalized cross-correlation over the first [`FEATURE_LEN`] elements of
/// `v1`/`v2`. Vectors longer than `FEATURE_LEN` are rejected (overflow
/// risk in the fixed-point accumulators).
///
/// # Errors
///
/// `MatchError::VectorTooLong` if either slice exceeds [`FEATURE_LEN`].
pub fn ncc(v1: &[i16], v2: &[i16]) -> Result<u32> {
    for v in [v1, v2] {
        if v.len() > FEATURE_LEN {
            return Err(MatchError::VectorTooLong { len: v.len(), max: FEATURE_LEN });
        }
    }

    let len = v1.len().min(v2.len());
    let mut corr: i64 = 0;
    let mut n1: i64 = 0;
    let mut n2: i64 = 0;
    for i in 0..len {
        let a = i64::from(v1[i]);
        let b = i64::from(v2[i]);
        corr += a * b;
        n1 += a * a;
        n2 += b * b;
    }

    if n1 == 0 || n2 == 0 {
        return Ok(0);
    }

    // Negative correlation is treated as zero.
    let ucorr = corr.max(0) as u64;
    let n1 = n1 as u64;
    let n2 = n2 as u64;

    let ms1 = bit_length(n1);
    let ms2 = bit_length(n2);
    let msc = bit_length(ucorr);

    let shift1 = symmetric_shift(msc, ms1);
    let shift2 = symmetric_shift(msc, ms2);

    let factor1 = (ucorr << shift1) / n1;
    let factor2 = (ucorr << shift2) / n2;
    let product = factor1 * factor2;

    let shift_back = i64::from(shift1) + i64::from(shift2) - 12;
    let score =
        if shift_back >= 0 { product >> shift_back } else { product << (-shift_back) };

    Ok(u32::try_from(score).unwrap_or(u32::MAX).min(MAX_SCORE))
}

/// `shift = min(16 - max(msc - ms, 0), 32 - msc)`, clamped to a
/// non-negative, sub-64 shift amount so the `<<` above never overflows or
/// panics on degenerate (all-zero) inputs.
fn symmetric_shift(msc: u32, ms: u32) -> u32 {
    let a = 16i64.saturating_sub(i64::from(msc.saturating_sub(ms)).max(0));
    let b = 32i64 - i64::from(msc);
    a.min(b).clamp(0, 63) as u32
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn in_range_vec() -> impl Strategy<Value = Vec<i16>> {
        proptest::collection::vec(-1023i16..=1023, FEATURE_LEN)
    }

    #[test]
    fn identical_vectors_score_max() {
        let v = vec![100i16; FEATURE_LEN];
        assert_eq!(ncc(&v, &v).unwrap(), MAX_SCORE);
    }

    #[test]
    fn opposite_vectors_score_zero() {
        let v1 = vec![100i16; FEATURE_LEN];
        let v2 = vec![-100i16; FEATURE_LEN];
        assert_eq!(ncc(&v1, &v2).unwrap(), 0);
    }

    #[test]
    fn rejects_overlong_vectors() {
        let v = vec![1i16; FEATURE_LEN + 1];
        assert!(matches!(ncc(&v, &v), Err(MatchError::VectorTooLong { .. })));
    }

    #[test]
    fn all_zero_vectors_score_zero_not_panic() {
        let v = vec![0i16; FEATURE_LEN];
        assert_eq!(ncc(&v, &v).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn score_within_bounds(v1 in in_range_vec(), v2 in in_range_vec()) {
            let score = ncc(&v1, &v2).unwrap();
            prop_assert!(score <= MAX_SCORE);
        }

        #[test]
        fn symmetric(v1 in in_range_vec(), v2 in in_range_vec()) {
            prop_assert_eq!(ncc(&v1, &v2).unwrap(), ncc(&v2, &v1).unwrap());
        }

        #[test]
        fn reflexive_nonzero(v in in_range_vec().prop_filter("non-zero", |v| v.iter().any(|&x| x != 0))) {
            prop_assert_eq!(ncc(&v, &v).unwrap(), MAX_SCORE);
        }
    }
}
