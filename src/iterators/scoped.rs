//! Traversal with forbidden-index bookkeeping.

use ahash::AHashSet;

use super::traverse::{Event, TreeIterator};
use crate::structure::IndexName;
use crate::tree::Tensor;

/// A [`TreeIterator`] that also answers "which index names are in play?".
///
/// Substitution must rename the dummies of every spliced-in replacement away
/// from all names the tree uses, including names other replacements just
/// introduced. The full name set is only computed when first asked for, and
/// replacement names are folded in incrementally.
pub struct ScopedIterator {
    inner: TreeIterator,
    root: Tensor,
    forbidden: Option<AHashSet<IndexName>>,
    pending: Vec<Tensor>,
}

impl ScopedIterator {
    pub fn new(root: &Tensor) -> Self {
        ScopedIterator {
            inner: TreeIterator::new(root),
            root: root.clone(),
            forbidden: None,
            pending: Vec::new(),
        }
    }

    pub fn with_guide(root: &Tensor, guide: impl Fn(&Tensor) -> bool + 'static) -> Self {
        ScopedIterator {
            inner: TreeIterator::with_guide(root, guide),
            root: root.clone(),
            forbidden: None,
            pending: Vec::new(),
        }
    }

    pub fn next(&mut self) -> Option<(Event, Tensor)> {
        self.inner.next()
    }

    pub fn set(&mut self, replacement: Tensor) {
        self.pending.push(replacement.clone());
        self.inner.set(replacement);
    }

    /// Every index name of the original tree plus everything replacements
    /// brought in. Fresh dummies must stay outside this set.
    ///
    /// The set spans the whole tree, not just the nearest enclosing
    /// product scope: the superset stays valid wherever the next
    /// replacement lands, at the cost of avoiding more names than the
    /// local scope strictly requires.
    pub fn forbidden(&mut self) -> &AHashSet<IndexName> {
        let set = self
            .forbidden
            .get_or_insert_with(|| self.root.all_index_names());
        for spliced in self.pending.drain(..) {
            spliced.collect_all_names(set);
        }
        set
    }

    pub fn result(self) -> Tensor {
        self.inner.result()
    }
}
