//! Index value types.
//!
//! An [`Index`] is the atom of the whole engine: a *kind* (which alphabet the
//! index lives in), a *polarity* (upper or lower position) and a numeric id.
//! Whether an index is free or a contracted dummy is never stored on the
//! index itself: it is decided contextually by counting occurrences with
//! opposite polarity inside the enclosing product scope (see
//! [`crate::tree::indices`]).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::utils::{greek_name, latin_name};

pub mod permutation;
pub mod symmetry;

/// The alphabet an index belongs to. Indices of different kinds never
/// contract with each other.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum IndexKind {
    Latin,
    Greek,
}

impl IndexKind {
    pub const ALL: [IndexKind; 2] = [IndexKind::Latin, IndexKind::Greek];
}

/// Upper (contravariant) or lower (covariant) index position.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Polarity {
    Upper,
    Lower,
}

impl Polarity {
    pub fn flip(self) -> Self {
        match self {
            Polarity::Upper => Polarity::Lower,
            Polarity::Lower => Polarity::Upper,
        }
    }
}

/// The identity of an index, without its position: two occurrences of the
/// same `IndexName` with opposite polarity form a contraction.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IndexName {
    pub kind: IndexKind,
    pub id: u32,
}

impl IndexName {
    pub fn new(kind: IndexKind, id: u32) -> Self {
        IndexName { kind, id }
    }
}

impl Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IndexKind::Latin => write!(f, "{}", latin_name(self.id)),
            IndexKind::Greek => write!(f, "{}", greek_name(self.id)),
        }
    }
}

/// One index occurrence in a tensor's signature.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Index {
    pub name: IndexName,
    pub polarity: Polarity,
}

impl Index {
    pub fn upper(name: IndexName) -> Self {
        Index {
            name,
            polarity: Polarity::Upper,
        }
    }

    pub fn lower(name: IndexName) -> Self {
        Index {
            name,
            polarity: Polarity::Lower,
        }
    }

    /// The same name in the opposite position.
    pub fn dual(self) -> Self {
        Index {
            name: self.name,
            polarity: self.polarity.flip(),
        }
    }

    /// True when `other` is the matching half of a contraction pair.
    pub fn contracts_with(&self, other: &Index) -> bool {
        self.name == other.name && self.polarity != other.polarity
    }

    /// Keeps the position, replaces the identity.
    pub fn renamed(self, name: IndexName) -> Self {
        Index {
            name,
            polarity: self.polarity,
        }
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.polarity {
            Polarity::Upper => write!(f, "^{{{}}}", self.name),
            Polarity::Lower => write!(f, "_{{{}}}", self.name),
        }
    }
}

/// Allocates index ids that avoid a caller-supplied forbidden set.
///
/// Fresh ids are handed out per kind, scanning upward from the last grant, so
/// repeated allocation inside one transformation never collides with itself.
#[derive(Debug, Clone, Default)]
pub struct FreshNames {
    next_latin: u32,
    next_greek: u32,
}

impl FreshNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start scanning above every id already present in `used`.
    pub fn above<'a>(used: impl IntoIterator<Item = &'a IndexName>) -> Self {
        let mut fresh = FreshNames::new();
        for name in used {
            fresh.note(*name);
        }
        fresh
    }

    /// Make sure a later [`FreshNames::fresh`] call never returns `name`.
    pub fn note(&mut self, name: IndexName) {
        let next = match name.kind {
            IndexKind::Latin => &mut self.next_latin,
            IndexKind::Greek => &mut self.next_greek,
        };
        if name.id >= *next {
            *next = name.id + 1;
        }
    }

    /// The next unused name of the given kind outside `forbidden`.
    pub fn fresh(
        &mut self,
        kind: IndexKind,
        forbidden: &ahash::AHashSet<IndexName>,
    ) -> IndexName {
        let next = match kind {
            IndexKind::Latin => &mut self.next_latin,
            IndexKind::Greek => &mut self.next_greek,
        };
        loop {
            let candidate = IndexName::new(kind, *next);
            *next += 1;
            if !forbidden.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[test]
    fn contraction_pairs() {
        let m = IndexName::new(IndexKind::Latin, 12);
        assert!(Index::upper(m).contracts_with(&Index::lower(m)));
        assert!(!Index::upper(m).contracts_with(&Index::upper(m)));
        assert!(!Index::upper(m).contracts_with(&Index::lower(IndexName::new(IndexKind::Latin, 1))));
    }

    #[test]
    fn fresh_skips_forbidden() {
        let mut forbidden = AHashSet::new();
        forbidden.insert(IndexName::new(IndexKind::Latin, 0));
        forbidden.insert(IndexName::new(IndexKind::Latin, 1));
        let mut fresh = FreshNames::new();
        let got = fresh.fresh(IndexKind::Latin, &forbidden);
        assert_eq!(got, IndexName::new(IndexKind::Latin, 2));
        let next = fresh.fresh(IndexKind::Latin, &forbidden);
        assert_eq!(next, IndexName::new(IndexKind::Latin, 3));
    }

    #[test]
    fn fresh_above_used() {
        let used = [IndexName::new(IndexKind::Latin, 7)];
        let mut fresh = FreshNames::above(used.iter());
        let got = fresh.fresh(IndexKind::Latin, &AHashSet::new());
        assert_eq!(got.id, 8);
    }
}
