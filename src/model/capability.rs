//! model::capability — tagged set of the optional behaviors a model exposes.
//!
//! Every [`ModelKernel`](crate::model::ModelKernel) advertises which of its
//! optional methods are real implementations. Generic code asks the set
//! instead of probing for a missing behavior, and composite builders derive
//! their own set from their sub-models' sets.
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// One optional model behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Density,
    LogLikelihood,
    Score,
    Draw,
    Cdf,
    Constraint,
    Estimate,
    Prep,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Density,
        Capability::LogLikelihood,
        Capability::Score,
        Capability::Draw,
        Capability::Cdf,
        Capability::Constraint,
        Capability::Estimate,
        Capability::Prep,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Density => "density",
            Capability::LogLikelihood => "log likelihood",
            Capability::Score => "score",
            Capability::Draw => "draw",
            Capability::Cdf => "cdf",
            Capability::Constraint => "constraint",
            Capability::Estimate => "estimate",
            Capability::Prep => "prep",
        };
        f.write_str(name)
    }
}

/// Bitset over [`Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub fn of(caps: &[Capability]) -> Self {
        caps.iter().fold(Self::EMPTY, |acc, &c| acc.with(c))
    }

    pub const fn with(self, cap: Capability) -> Self {
        CapabilitySet(self.0 | cap.bit())
    }

    pub const fn without(self, cap: Capability) -> Self {
        CapabilitySet(self.0 & !cap.bit())
    }

    /// `with(cap)` when `on`, otherwise unchanged.
    pub const fn with_if(self, cap: Capability, on: bool) -> Self {
        if on { self.with(cap) } else { self }
    }

    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub const fn union(self, other: Self) -> Self {
        CapabilitySet(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        CapabilitySet(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// A density or a log likelihood is available, directly or via the
    /// exp/ln fallback.
    pub const fn can_evaluate(self) -> bool {
        self.contains(Capability::Density) || self.contains(Capability::LogLikelihood)
    }

    /// Intersection over a collection of sets; empty input gives the empty set.
    pub fn intersect_all<I: IntoIterator<Item = CapabilitySet>>(sets: I) -> Self {
        let mut it = sets.into_iter();
        match it.next() {
            Some(first) => it.fold(first, CapabilitySet::intersection),
            None => Self::EMPTY,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl BitOr for CapabilitySet {
    type Output = CapabilitySet;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for CapabilitySet {
    type Output = CapabilitySet;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, CapabilitySet::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Check set algebra used by composite builders.
    //
    // Given
    // -----
    // - `{Density, Draw}` and `{LogLikelihood, Draw, Score}`.
    //
    // Expect
    // ------
    // - Intersection is `{Draw}`; union has four members.
    // - Both sets can evaluate; their intersection cannot.
    fn set_algebra_matches_members() {
        // Arrange
        let a = CapabilitySet::of(&[Capability::Density, Capability::Draw]);
        let b = CapabilitySet::of(&[Capability::LogLikelihood, Capability::Draw, Capability::Score]);

        // Act
        let both = a & b;
        let either = a | b;

        // Assert
        assert_eq!(both.iter().collect::<Vec<_>>(), vec![Capability::Draw]);
        assert_eq!(either.iter().count(), 4);
        assert!(a.can_evaluate() && b.can_evaluate());
        assert!(!both.can_evaluate());
        assert_eq!(CapabilitySet::intersect_all([a, b, either]), both);
        assert!(!a.without(Capability::Draw).contains(Capability::Draw));
    }
}
