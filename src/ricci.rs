//! Symbolic algebra over indexed tensors.
//!
//! Expressions are immutable trees ([`Tensor`]) of sums, products, powers,
//! scalar functions and indexed symbols over exact rational coefficients.
//! Whether an index is free or a contracted dummy is decided contextually,
//! by polarity-paired occurrences within a product scope; power bases,
//! function arguments and field arguments open fresh scopes of their own.
//!
//! Symbol names, declared permutational symmetries and space dimensions
//! live in an explicit session [`Context`]. On top of the trees sit the
//! rewriting engines of [`transformations`]: expansion of products and
//! integer powers over sums, metric and Kronecker delta elimination, and
//! pattern-matching substitution, all honoring one contract: a tree an
//! engine has nothing to do with comes back as the same handle
//! ([`Tensor::same_node`]).
//!
//! ```
//! use ricci::{Context, expand};
//!
//! let ctx = Context::new();
//! let t = ctx.parse("(A_{m}*B^{m} + x)^2").unwrap();
//! let expanded = expand(&t);
//! assert_eq!(expanded.as_sum().unwrap().addends.len(), 3);
//! ```

pub mod context;
pub mod iterators;
pub mod mapping;
pub mod parse;
pub mod structure;
pub mod transformations;
pub mod tree;
pub mod utils;

pub use context::{Context, NameId};
pub use structure::{Index, IndexKind, IndexName, Polarity};
pub use transformations::{
    eliminate_metrics, expand, expand_all, expand_denominator, expand_numerator, EliminateMetrics,
    Expand, ExpandScope, Substitution, Transformation,
};
pub use tree::{Node, Tensor};
