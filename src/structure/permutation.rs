//! Permutations of index positions.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PermutationError {
    #[error("image {0:?} is not a permutation of 0..{1}")]
    NotAPermutation(Vec<u32>, usize),
    #[error("permutation degree {0} does not match expected degree {1}")]
    DegreeMismatch(usize, usize),
}

/// A permutation of `0..degree`, stored as its image: position `i` of the
/// permuted signature takes the index that sat at `image[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    image: Vec<u32>,
}

impl Permutation {
    pub fn identity(degree: usize) -> Self {
        Permutation {
            image: (0..degree as u32).collect(),
        }
    }

    pub fn new(image: Vec<u32>) -> Result<Self, PermutationError> {
        let degree = image.len();
        let mut seen = vec![false; degree];
        for &i in &image {
            if (i as usize) >= degree || seen[i as usize] {
                return Err(PermutationError::NotAPermutation(image, degree));
            }
            seen[i as usize] = true;
        }
        Ok(Permutation { image })
    }

    /// The transposition of `i` and `j` within `0..degree`.
    pub fn transposition(degree: usize, i: usize, j: usize) -> Self {
        let mut image: Vec<u32> = (0..degree as u32).collect();
        image.swap(i, j);
        Permutation { image }
    }

    /// A single cycle shifting every position by one.
    pub fn cycle(degree: usize) -> Self {
        let image = (0..degree as u32).map(|i| (i + 1) % degree as u32).collect();
        Permutation { image }
    }

    pub fn degree(&self) -> usize {
        self.image.len()
    }

    pub fn is_identity(&self) -> bool {
        self.image.iter().enumerate().all(|(i, &v)| i as u32 == v)
    }

    /// Where position `i` draws its element from.
    pub fn source(&self, i: usize) -> usize {
        self.image[i] as usize
    }

    /// `self` applied after `other`.
    pub fn compose(&self, other: &Permutation) -> Permutation {
        debug_assert_eq!(self.degree(), other.degree());
        Permutation {
            image: self
                .image
                .iter()
                .map(|&i| other.image[i as usize])
                .collect(),
        }
    }

    /// Reorders a slice, producing the permuted copy.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        debug_assert_eq!(self.degree(), items.len());
        self.image
            .iter()
            .map(|&i| items[i as usize].clone())
            .collect()
    }
}

impl Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.image.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_permutations() {
        assert!(Permutation::new(vec![0, 0]).is_err());
        assert!(Permutation::new(vec![0, 2]).is_err());
        assert!(Permutation::new(vec![1, 0, 2]).is_ok());
    }

    #[test]
    fn composition_order() {
        // transposition then cycle on three elements
        let t = Permutation::transposition(3, 0, 1);
        let c = Permutation::cycle(3);
        let items = ["a", "b", "c"];
        let via_compose = t.compose(&c).apply(&items);
        let stepwise = t.apply(&c.apply(&items));
        assert_eq!(via_compose, stepwise);
    }

    #[test]
    fn apply_transposition() {
        let t = Permutation::transposition(2, 0, 1);
        assert_eq!(t.apply(&[10, 20]), vec![20, 10]);
        assert!(!t.is_identity());
        assert!(t.compose(&t).is_identity());
    }
}
