//! The session registry: symbol interning, symmetry registration, and
//! per-kind metadata.
//!
//! Everything a session needs to share lives here, as an explicit,
//! injected object with an explicit lifecycle: create one per session
//! (or per test), drop it when done. A [`Context`] is a cheap
//! `Rc` handle, so engines that need symmetry information simply keep a
//! clone.

use ahash::AHashMap;
use indexmap::IndexMap;
use num::BigRational;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::parse::{self, ParseError};
use crate::structure::symmetry::{Symmetries, Symmetry, SymmetryError};
use crate::structure::{Index, IndexKind};
use crate::tree::display::DisplayTensor;
use crate::tree::Tensor;

/// Interned symbol identity. Ids are dense and stable for the lifetime of
/// the owning [`Context`].
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NameId(pub u32);

#[derive(Debug, Default)]
struct SymbolInfo {
    symmetries: Symmetries,
    /// Signature length the symmetries were declared against.
    degree: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    symbols: IndexMap<String, SymbolInfo>,
    dimensions: AHashMap<IndexKind, BigRational>,
}

/// A cheap, cloneable handle to the session state.
#[derive(Clone, Debug)]
pub struct Context(Rc<RefCell<State>>);

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A fresh session. The metric symbol `g` (declared symmetric in its two
    /// indices) and the Kronecker delta `d` are pre-interned so the
    /// elimination engine can recognize them by id.
    pub fn new() -> Self {
        let ctx = Context(Rc::new(RefCell::new(State::default())));
        let g = ctx.intern("g");
        ctx.declare_symmetric(g, 2)
            .expect("fresh metric symbol accepts a symmetry");
        ctx.intern("d");
        ctx
    }

    pub fn intern(&self, name: &str) -> NameId {
        let mut state = self.0.borrow_mut();
        if let Some(id) = state.symbols.get_index_of(name) {
            return NameId(id as u32);
        }
        let (id, _) = state
            .symbols
            .insert_full(name.to_owned(), SymbolInfo::default());
        NameId(id as u32)
    }

    pub fn name_str(&self, id: NameId) -> String {
        self.0
            .borrow()
            .symbols
            .get_index(id.0 as usize)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| format!("?{}", id.0))
    }

    /// The metric symbol.
    pub fn metric(&self) -> NameId {
        NameId(0)
    }

    /// The Kronecker delta symbol.
    pub fn delta(&self) -> NameId {
        NameId(1)
    }

    pub fn is_metric_kind(&self, id: NameId) -> bool {
        id == self.metric() || id == self.delta()
    }

    /// Registers one signed permutation for `name`, whose signature length
    /// must be `degree` everywhere it is used.
    pub fn declare_symmetry(
        &self,
        name: NameId,
        symmetry: Symmetry,
        degree: usize,
    ) -> Result<(), SymmetryError> {
        let mut state = self.0.borrow_mut();
        let info = state
            .symbols
            .get_index_mut(name.0 as usize)
            .map(|(_, info)| info)
            .expect("interned symbol");
        if let Some(existing) = info.degree {
            if existing != degree {
                return Err(SymmetryError::DegreeMismatch(degree, existing));
            }
        }
        info.degree = Some(degree);
        info.symmetries.add(symmetry, degree)
    }

    pub fn declare_symmetric(&self, name: NameId, degree: usize) -> Result<(), SymmetryError> {
        for generator in Symmetries::symmetric(degree).into_generators() {
            self.declare_symmetry(name, generator, degree)?;
        }
        Ok(())
    }

    pub fn declare_antisymmetric(&self, name: NameId, degree: usize) -> Result<(), SymmetryError> {
        for generator in Symmetries::antisymmetric(degree).into_generators() {
            self.declare_symmetry(name, generator, degree)?;
        }
        Ok(())
    }

    /// The enumerated symmetry group of `name` for a signature of the given
    /// length. Always contains at least the identity.
    pub fn symmetries_of(&self, name: NameId, degree: usize) -> Vec<Symmetry> {
        let state = self.0.borrow();
        let info = state.symbols.get_index(name.0 as usize).map(|(_, i)| i);
        match info {
            Some(info) if info.degree == Some(degree) => info.symmetries.enumerate(degree),
            _ => vec![Symmetry::identity(degree)],
        }
    }

    /// Registers the dimension a full delta trace `d^{a}_{a}` of this kind
    /// collapses to.
    pub fn set_dimension(&self, kind: IndexKind, dimension: BigRational) {
        self.0.borrow_mut().dimensions.insert(kind, dimension);
    }

    pub fn dimension(&self, kind: IndexKind) -> Option<BigRational> {
        self.0.borrow().dimensions.get(&kind).cloned()
    }

    /// `g` with the two given indices (same polarity) or the mixed-polarity
    /// Kronecker delta, picked from the polarities.
    pub fn metric_tensor(&self, a: Index, b: Index) -> Tensor {
        let name = if a.polarity == b.polarity {
            self.metric()
        } else {
            self.delta()
        };
        Tensor::simple(name, vec![a, b])
    }

    /// Structural equality up to dummy renaming.
    pub fn equivalent(&self, a: &Tensor, b: &Tensor) -> bool {
        a == b || crate::mapping::canonical_form(a) == crate::mapping::canonical_form(b)
    }

    pub fn parse(&self, text: &str) -> Result<Tensor, ParseError> {
        parse::parse(self, text)
    }

    /// Parses a `lhs = rhs` rewrite rule.
    pub fn parse_rule(&self, text: &str) -> Result<(Tensor, Tensor), ParseError> {
        parse::parse_rule(self, text)
    }

    pub fn display<'a>(&'a self, tensor: &'a Tensor) -> DisplayTensor<'a> {
        DisplayTensor { tensor, ctx: self }
    }

    pub fn show(&self, tensor: &Tensor) -> String {
        self.display(tensor).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let ctx = Context::new();
        let a = ctx.intern("A");
        let b = ctx.intern("B");
        assert_ne!(a, b);
        assert_eq!(ctx.intern("A"), a);
        assert_eq!(ctx.name_str(a), "A");
    }

    #[test]
    fn metric_and_delta_are_preinterned() {
        let ctx = Context::new();
        assert_eq!(ctx.intern("g"), ctx.metric());
        assert_eq!(ctx.intern("d"), ctx.delta());
        assert!(ctx.is_metric_kind(ctx.metric()));
    }

    #[test]
    fn metric_is_symmetric_by_default() {
        let ctx = Context::new();
        let group = ctx.symmetries_of(ctx.metric(), 2);
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn symmetry_degree_is_checked() {
        let ctx = Context::new();
        let a = ctx.intern("A");
        ctx.declare_antisymmetric(a, 2).unwrap();
        assert!(ctx.declare_symmetric(a, 3).is_err());
    }

    #[test]
    fn independent_sessions_do_not_share_names() {
        let first = Context::new();
        let second = Context::new();
        first.intern("OnlyHere");
        assert_eq!(second.name_str(NameId(7)), "?7");
    }
}
