//! Tree-rewriting engines.
//!
//! Every engine is a value implementing [`Transformation`]: construct it
//! (usually against a [`crate::context::Context`]), then apply it to as many
//! trees as needed. All of them honor the reference-stability contract of
//! [`crate::tree::Tensor::same_node`]: a tree the engine has nothing to do
//! with comes back as the same handle.

use dyn_clone::DynClone;

use crate::tree::Tensor;

pub mod eliminate;
pub mod expand;
pub mod expand_port;
pub mod substitutions;

pub use eliminate::{eliminate_metrics, EliminateMetrics};
pub use expand::{expand, expand_all, expand_denominator, expand_numerator, Expand, ExpandScope};
pub use expand_port::ExpandPort;
pub use substitutions::{Substitution, SubstitutionError};

/// A rewriting pass over a tree.
pub trait Transformation: DynClone {
    fn transform(&self, t: &Tensor) -> Tensor;
}

dyn_clone::clone_trait_object!(Transformation);

impl<F> Transformation for F
where
    F: Fn(&Tensor) -> Tensor + Clone,
{
    fn transform(&self, t: &Tensor) -> Tensor {
        self(t)
    }
}

/// Applies a pipeline left to right.
pub fn apply_all(transformations: &[Box<dyn Transformation>], t: &Tensor) -> Tensor {
    let mut current = t.clone();
    for transformation in transformations {
        current = transformation.transform(&current);
    }
    current
}
