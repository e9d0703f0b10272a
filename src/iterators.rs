//! Tree traversal with in-flight rewriting.
//!
//! [`TreeIterator`] walks a tree depth-first, yielding every node twice
//! (entering and leaving) and letting the caller swap the last-yielded node
//! for a replacement. The walk rebuilds only along changed paths, so an
//! untouched traversal hands back the original root handle.
//!
//! [`ScopedIterator`] layers the bookkeeping the substitution engine needs
//! on top: a lazily computed set of every index name in play, kept current
//! as replacements are spliced in.

pub mod scoped;
pub mod traverse;

pub use scoped::ScopedIterator;
pub use traverse::{Event, TreeIterator};
