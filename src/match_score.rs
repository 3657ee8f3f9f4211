//! Quantitative fitness of a trial unmarshal.
//!
//! When a codec is asked whether a JSON value could become a given
//! [`TypeSpec`](crate::types::TypeSpec), it answers with a [`MatchScore`]:
//! a non-negative mismatch count where zero is a perfect fit. The overload
//! resolver aggregates per-position scores with [`MatchScore::worse`] and
//! picks the candidate signature with the lowest aggregate.

use std::fmt;

/// Mismatch score of a candidate unmarshal. Lower is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MatchScore(u32);

impl MatchScore {
    /// Perfect fit.
    pub const EXACT: MatchScore = MatchScore(0);
    /// Acceptable with a benign conversion (say, a number read as text).
    pub const SIMILAR: MatchScore = MatchScore(1);
    /// Usable only through a lossy or unusual reading.
    pub const ROUGH: MatchScore = MatchScore(2);

    /// A score with an explicit mismatch count.
    pub fn with_mismatch(mismatch: u32) -> Self {
        Self(mismatch)
    }

    /// The mismatch count.
    pub fn mismatch(self) -> u32 {
        self.0
    }

    /// The worse (larger mismatch) of two scores. This is the positional
    /// aggregate used while ranking an overload candidate: a signature is
    /// only as good as its worst-fitting argument.
    pub fn worse(self, other: MatchScore) -> MatchScore {
        if other.0 > self.0 { other } else { self }
    }

    /// Add a flat penalty, saturating.
    pub fn penalize(self, by: u32) -> MatchScore {
        Self(self.0.saturating_add(by))
    }

    /// `true` when the fit is perfect.
    pub fn is_exact(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for MatchScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::EXACT => write!(f, "exact"),
            Self::SIMILAR => write!(f, "similar"),
            Self::ROUGH => write!(f, "rough"),
            Self(n) => write!(f, "mismatch({n})"),
        }
    }
}
