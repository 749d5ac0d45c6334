//! Faceprints/MatchElement data model, grounded in
//! `FaceprintsDefines.h`.

/// Length of a full descriptor: 512 feature elements + 1 flag word + 2
/// reserved elements.
pub const VECTOR_LEN: usize = 515;
/// Length of the feature portion of a descriptor.
pub const FEATURE_LEN: usize = 512;
/// Index of the mask-flag element within a descriptor.
pub const FLAG_INDEX: usize = FEATURE_LEN;

/// Inclusive bound on an in-range feature element.
pub const MAX_FEATURE_VALUE: i16 = 1023;
pub const MIN_FEATURE_VALUE: i16 = -MAX_FEATURE_VALUE;

/// A 515-element descriptor: 512 feature values, a mask-flag word, and two
/// reserved elements. Stored flat rather than as a `[i16; 512]` + enum pair
/// because the flag genuinely lives inside the wire vector (element 512),
/// per `FaceprintsDefines.h`.
pub type Descriptor = [i16; VECTOR_LEN];

/// Provenance of the enrollment vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeaturesType {
    W10,
    Rgb,
}

/// Mask state carried in a descriptor's flag element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFlag {
    NotSet,
    ValidWithMask,
    ValidWithoutMask,
    Invalid,
}

impl VectorFlag {
    #[must_use]
    pub const fn from_raw(raw: i16) -> Self {
        match raw {
            1 => Self::ValidWithMask,
            2 => Self::ValidWithoutMask,
            3 => Self::Invalid,
            _ => Self::NotSet,
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> i16 {
        match self {
            Self::NotSet => 0,
            Self::ValidWithMask => 1,
            Self::ValidWithoutMask => 2,
            Self::Invalid => 3,
        }
    }
}

/// A per-user biometric record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Faceprints {
    pub version: u16,
    pub features_type: FeaturesType,
    pub flags: u32,
    /// Anchor vector; never mutated after enrollment.
    pub enrollment: Descriptor,
    pub adaptive_without_mask: Descriptor,
    pub adaptive_with_mask: Descriptor,
}

impl Faceprints {
    #[must_use]
    pub fn with_mask_flag(&self) -> VectorFlag {
        VectorFlag::from_raw(self.adaptive_with_mask[FLAG_INDEX])
    }
}

/// A single match probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchElement {
    pub version: u16,
    pub features_type: FeaturesType,
    pub flags: u32,
    pub vector: Descriptor,
}

impl MatchElement {
    #[must_use]
    pub fn has_mask(&self) -> bool {
        VectorFlag::from_raw(self.vector[FLAG_INDEX]) == VectorFlag::ValidWithMask
    }
}

/// Validate that every feature element of `descriptor` lies within the
/// declared range. Only the first [`FEATURE_LEN`] elements are
/// range-checked; the flag and reserved elements are out of range by design.
#[must_use]
pub fn in_range(descriptor: &Descriptor) -> bool {
    descriptor[..FEATURE_LEN].iter().all(|&v| (MIN_FEATURE_VALUE..=MAX_FEATURE_VALUE).contains(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_ignores_flag_word() {
        let mut d = [100i16; VECTOR_LEN];
        d[FLAG_INDEX] = VectorFlag::ValidWithMask.to_raw();
        assert!(in_range(&d));
    }

    #[test]
    fn range_check_catches_out_of_range_feature() {
        let mut d = [100i16; VECTOR_LEN];
        d[10] = MAX_FEATURE_VALUE + 1;
        assert!(!in_range(&d));
    }

    #[test]
    fn vector_flag_round_trips() {
        for flag in [VectorFlag::NotSet, VectorFlag::ValidWithMask, VectorFlag::ValidWithoutMask, VectorFlag::Invalid]
        {
            assert_eq!(VectorFlag::from_raw(flag.to_raw()), flag);
        }
    }
}
