//! Signed permutational symmetries of a tensor's index signature.
//!
//! A symmetry is a permutation of the index slots together with a sign:
//! `T` permuted by `p` equals `sign * T`. The registered generators are
//! closed into a (capped) group on demand; every enumeration starts with the
//! identity so callers can treat "no symmetry declared" and "trivial group"
//! uniformly.

use serde::{Deserialize, Serialize};
use std::ops::Mul;
use thiserror::Error;

use super::permutation::{Permutation, PermutationError};

/// Enumerating a symmetry group stops after this many elements; signatures
/// long enough to overflow it do not occur in practice.
const GROUP_CAP: usize = 4096;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SymmetryError {
    #[error("{0}")]
    Permutation(#[from] PermutationError),
    #[error("symmetry degree {0} does not match the tensor's {1} indices")]
    DegreeMismatch(usize, usize),
    #[error("the declared symmetries force the tensor to vanish")]
    InconsistentSign,
}

/// The sign a permutation carries.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Sign {
    #[default]
    Plus,
    Minus,
}

impl Sign {
    pub fn is_negative(self) -> bool {
        self == Sign::Minus
    }
}

impl Mul for Sign {
    type Output = Sign;

    fn mul(self, rhs: Sign) -> Sign {
        if self == rhs {
            Sign::Plus
        } else {
            Sign::Minus
        }
    }
}

/// One signed permutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symmetry {
    pub permutation: Permutation,
    pub sign: Sign,
}

impl Symmetry {
    pub fn new(permutation: Permutation, sign: Sign) -> Self {
        Symmetry { permutation, sign }
    }

    pub fn identity(degree: usize) -> Self {
        Symmetry {
            permutation: Permutation::identity(degree),
            sign: Sign::Plus,
        }
    }
}

/// The set of symmetry generators declared for one tensor signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symmetries {
    generators: Vec<Symmetry>,
}

impl Symmetries {
    pub fn none() -> Self {
        Symmetries::default()
    }

    /// The full symmetric group over `degree` slots (adjacent transposition
    /// generators), all signs positive.
    pub fn symmetric(degree: usize) -> Self {
        let mut generators = Vec::new();
        for i in 1..degree {
            generators.push(Symmetry::new(
                Permutation::transposition(degree, i - 1, i),
                Sign::Plus,
            ));
        }
        Symmetries { generators }
    }

    /// The full symmetric group with the parity sign on each transposition.
    pub fn antisymmetric(degree: usize) -> Self {
        let mut generators = Vec::new();
        for i in 1..degree {
            generators.push(Symmetry::new(
                Permutation::transposition(degree, i - 1, i),
                Sign::Minus,
            ));
        }
        Symmetries { generators }
    }

    pub fn is_trivial(&self) -> bool {
        self.generators
            .iter()
            .all(|s| s.permutation.is_identity() && s.sign == Sign::Plus)
    }

    pub fn add(&mut self, symmetry: Symmetry, degree: usize) -> Result<(), SymmetryError> {
        if symmetry.permutation.degree() != degree {
            return Err(SymmetryError::DegreeMismatch(
                symmetry.permutation.degree(),
                degree,
            ));
        }
        self.generators.push(symmetry);
        Ok(())
    }

    /// Closes the generators into a group, capped at [`GROUP_CAP`] elements.
    ///
    /// The identity is always first. If the closure derives the identity
    /// permutation with a minus sign the group is inconsistent (the tensor is
    /// identically zero) and the offending element is still reported, so
    /// callers can detect the situation.
    pub fn enumerate(&self, degree: usize) -> Vec<Symmetry> {
        let mut elements = vec![Symmetry::identity(degree)];
        let mut frontier = vec![Symmetry::identity(degree)];
        while let Some(current) = frontier.pop() {
            for generator in &self.generators {
                let composed = Symmetry::new(
                    generator.permutation.compose(&current.permutation),
                    generator.sign * current.sign,
                );
                if !elements.contains(&composed) {
                    elements.push(composed.clone());
                    frontier.push(composed);
                    if elements.len() >= GROUP_CAP {
                        return elements;
                    }
                }
            }
        }
        elements
    }

    pub fn generators(&self) -> &[Symmetry] {
        &self.generators
    }

    pub fn into_generators(self) -> Vec<Symmetry> {
        self.generators
    }

    /// True when the closure contains the identity permutation with a minus
    /// sign, which forces the tensor to vanish.
    pub fn forces_zero(&self, degree: usize) -> bool {
        self.enumerate(degree)
            .iter()
            .any(|s| s.permutation.is_identity() && s.sign == Sign::Minus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_enumeration_is_identity_only() {
        let group = Symmetries::none().enumerate(3);
        assert_eq!(group, vec![Symmetry::identity(3)]);
    }

    #[test]
    fn symmetric_pair_group() {
        let group = Symmetries::symmetric(2).enumerate(2);
        assert_eq!(group.len(), 2);
        assert!(group.iter().all(|s| s.sign == Sign::Plus));
    }

    #[test]
    fn antisymmetric_pair_group() {
        let group = Symmetries::antisymmetric(2).enumerate(2);
        assert_eq!(group.len(), 2);
        let swap = group
            .iter()
            .find(|s| !s.permutation.is_identity())
            .expect("swap element");
        assert_eq!(swap.sign, Sign::Minus);
    }

    #[test]
    fn full_symmetric_group_of_three() {
        let group = Symmetries::symmetric(3).enumerate(3);
        assert_eq!(group.len(), 6);
    }

    #[test]
    fn antisymmetric_never_forces_zero_on_its_own() {
        assert!(!Symmetries::antisymmetric(2).forces_zero(2));
        // symmetric and antisymmetric on the same pair does
        let mut both = Symmetries::symmetric(2);
        both.add(
            Symmetry::new(Permutation::transposition(2, 0, 1), Sign::Minus),
            2,
        )
        .unwrap();
        assert!(both.forces_zero(2));
    }
}
