//! The two sides of a trade

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One side of a trade.
///
/// `Primary` is always the player who sent the request; the process hosting
/// that player is the initiation server for proxy trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Perspective {
    Primary,
    Secondary,
}

impl Perspective {
    /// Both perspectives in validation and commit order
    pub const ALL: [Perspective; 2] = [Perspective::Primary, Perspective::Secondary];

    /// The opposite side
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    /// Array index for per-side storage
    pub fn id(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// Exactly one value per side, indexed by `Perspective`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerSide<T>([T; 2]);

impl<T> PerSide<T> {
    pub fn new(primary: T, secondary: T) -> Self {
        Self([primary, secondary])
    }

    pub fn from_fn(mut f: impl FnMut(Perspective) -> T) -> Self {
        Self([f(Perspective::Primary), f(Perspective::Secondary)])
    }

    /// Iterate `(perspective, value)` in perspective order
    pub fn iter(&self) -> impl Iterator<Item = (Perspective, &T)> {
        Perspective::ALL.into_iter().zip(self.0.iter())
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PerSide<U> {
        let [a, b] = self.0;
        PerSide([f(a), f(b)])
    }

    pub fn each_ref(&self) -> PerSide<&T> {
        PerSide([&self.0[0], &self.0[1]])
    }
}

impl<T> Index<Perspective> for PerSide<T> {
    type Output = T;

    fn index(&self, perspective: Perspective) -> &T {
        &self.0[perspective.id()]
    }
}

impl<T> IndexMut<Perspective> for PerSide<T> {
    fn index_mut(&mut self, perspective: Perspective) -> &mut T {
        &mut self.0[perspective.id()]
    }
}

impl PerSide<bool> {
    pub fn both(&self) -> bool {
        self.0[0] && self.0[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_is_involution() {
        for p in Perspective::ALL {
            assert_eq!(p.other().other(), p);
            assert_ne!(p.other(), p);
        }
    }

    #[test]
    fn test_id_roundtrip() {
        for p in Perspective::ALL {
            assert_eq!(Perspective::from_id(p.id() as u8), Some(p));
        }
        assert_eq!(Perspective::from_id(2), None);
    }

    #[test]
    fn test_per_side_indexing() {
        let mut flags = PerSide::new(false, false);
        flags[Perspective::Secondary] = true;
        assert!(!flags[Perspective::Primary]);
        assert!(flags[Perspective::Secondary]);
        assert!(!flags.both());
        flags[Perspective::Primary] = true;
        assert!(flags.both());
    }
}
