//! Free/dummy index bookkeeping.
//!
//! Freeness is contextual: within one product scope a name occurring with
//! both polarities is a contracted dummy, a name occurring once is free.
//! Power bases/exponents and scalar-function arguments are independent
//! scopes with no free indices of their own; field arguments likewise, while
//! a field's *external* signature participates in the enclosing scope.

use ahash::AHashSet;
use thiserror::Error;

use super::{Node, Tensor};
use crate::structure::{Index, IndexName};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    #[error("index {0:?} occurs more than twice (or twice with equal polarity) in one product")]
    InconsistentProduct(IndexName),
    #[error("sum addends disagree on their free indices")]
    InconsistentSum,
}

/// Removes complete upper/lower pairs from a list of index occurrences,
/// returning the surviving (free) occurrences sorted by name.
fn cancel_pairs(mut occurrences: Vec<Index>) -> Vec<Index> {
    occurrences.sort();
    let mut free: Vec<Index> = Vec::with_capacity(occurrences.len());
    for index in occurrences {
        if let Some(last) = free.last() {
            if last.contracts_with(&index) {
                free.pop();
                continue;
            }
        }
        free.push(index);
    }
    free
}

impl Tensor {
    /// The free index occurrences of this subtree, sorted.
    pub fn free_indices(&self) -> Vec<Index> {
        match self.node() {
            Node::Number(_) | Node::Power(_) | Node::Function(_) => Vec::new(),
            Node::Simple(s) => cancel_pairs(s.indices.clone()),
            Node::Field(f) => cancel_pairs(f.indices.clone()),
            Node::Product(p) => {
                let mut all = Vec::new();
                for factor in &p.content {
                    all.extend(factor.free_indices());
                }
                cancel_pairs(all)
            }
            Node::Sum(s) => s
                .addends
                .iter()
                .find(|a| !matches!(a.node(), Node::Number(_)))
                .map(|a| a.free_indices())
                .unwrap_or_default(),
        }
    }

    pub fn free_names(&self) -> AHashSet<IndexName> {
        self.free_indices().into_iter().map(|i| i.name).collect()
    }

    /// Every index name appearing anywhere in the tree, including inside
    /// opaque scopes. This is the set used for forbidden-index bookkeeping.
    pub fn all_index_names(&self) -> AHashSet<IndexName> {
        let mut names = AHashSet::new();
        self.collect_all_names(&mut names);
        names
    }

    pub(crate) fn collect_all_names(&self, names: &mut AHashSet<IndexName>) {
        match self.node() {
            Node::Number(_) => {}
            Node::Simple(s) => names.extend(s.indices.iter().map(|i| i.name)),
            Node::Field(f) => {
                names.extend(f.indices.iter().map(|i| i.name));
                for arg in &f.args {
                    arg.collect_all_names(names);
                }
            }
            _ => {
                for i in 0..self.child_count() {
                    if let Some(child) = self.child(i) {
                        child.collect_all_names(names);
                    }
                }
            }
        }
    }

    /// Index names visible in the current scope: recursion stops at scalar
    /// scope boundaries (powers, function and field arguments).
    pub fn names_in_scope(&self) -> AHashSet<IndexName> {
        let mut names = AHashSet::new();
        self.collect_scope_names(&mut names);
        names
    }

    fn collect_scope_names(&self, names: &mut AHashSet<IndexName>) {
        match self.node() {
            Node::Number(_) | Node::Power(_) | Node::Function(_) => {}
            Node::Simple(s) => names.extend(s.indices.iter().map(|i| i.name)),
            Node::Field(f) => names.extend(f.indices.iter().map(|i| i.name)),
            Node::Product(p) => {
                for factor in &p.content {
                    factor.collect_scope_names(names);
                }
            }
            Node::Sum(s) => {
                for addend in &s.addends {
                    addend.collect_scope_names(names);
                }
            }
        }
    }

    /// Names contracted (or addend-locally contracted) within this scope.
    pub fn dummy_names(&self) -> AHashSet<IndexName> {
        let mut names = self.names_in_scope();
        for free in self.free_names() {
            names.remove(&free);
        }
        names
    }

    /// True when no index appears anywhere: the "symbolic" case the
    /// expansion engine can treat without any renaming.
    pub fn is_symbolic(&self) -> bool {
        self.all_index_names().is_empty()
    }

    /// True when the subtree carries no free indices (dummies allowed).
    pub fn is_indexless(&self) -> bool {
        self.free_indices().is_empty()
    }

    /// Validates the contraction invariant everywhere in the tree: within a
    /// product scope every name occurs at most once per polarity, and sum
    /// addends agree on their free indices.
    pub fn check_index_consistency(&self) -> Result<(), IndexError> {
        for i in 0..self.child_count() {
            if let Some(child) = self.child(i) {
                child.check_index_consistency()?;
            }
        }
        match self.node() {
            Node::Simple(s) => check_signature(&s.indices),
            Node::Field(f) => check_signature(&f.indices),
            Node::Product(p) => {
                let mut occurrences: Vec<Index> = Vec::new();
                for factor in &p.content {
                    occurrences.extend(factor.free_indices());
                }
                check_signature(&occurrences)
            }
            Node::Sum(s) => {
                let mut reference: Option<Vec<Index>> = None;
                for addend in &s.addends {
                    let free = addend.free_indices();
                    match &reference {
                        None => reference = Some(free),
                        Some(r) => {
                            if r != &free {
                                return Err(IndexError::InconsistentSum);
                            }
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn check_signature(occurrences: &[Index]) -> Result<(), IndexError> {
    let mut sorted = occurrences.to_vec();
    sorted.sort();
    for window in sorted.windows(2) {
        if window[0].name == window[1].name && window[0].polarity == window[1].polarity {
            return Err(IndexError::InconsistentProduct(window[0].name));
        }
    }
    // a third occurrence of a name sorts next to an equal-polarity twin, so
    // the window check already covers the more-than-twice case
    Ok(())
}
