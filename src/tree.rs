//! The immutable expression tree.
//!
//! A [`Tensor`] is a cheap handle over a reference-counted [`Node`]. Every
//! transformation in this crate produces a brand-new tree, and returns the
//! *same* handle when it made no change: `Rc::ptr_eq` (exposed as
//! [`Tensor::same_node`]) is the contract callers use to detect "no rewrite
//! happened" and terminate fixed-point loops cheaply.
//!
//! Structural invariants (maintained by the smart constructors in
//! [`builders`]):
//! - no addend of a [`Sum`] is itself a sum; numeric addends are folded into
//!   one; structurally equal addends are merged by summing their scalar
//!   factors; zero addends collapse to the additive identity;
//! - a [`Product`] keeps its numeric factor separate from its content, never
//!   contains a nested product or a bare number, groups repeated factors
//!   into powers, and collapses when the content empties;
//! - `x^0` is `1`, `x^1` is `x`, numeric powers with integer exponents fold.

use num::BigRational;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::context::NameId;
use crate::structure::Index;

pub mod builders;
pub mod display;
pub mod indices;
pub mod order;

/// A named symbol carrying an ordered index signature. Symbols without
/// indices (plain scalars) are simple tensors with an empty signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleTensor {
    pub name: NameId,
    pub indices: Vec<Index>,
}

/// Flattened addends; see the module invariants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sum {
    pub addends: Vec<Tensor>,
}

/// A numeric factor kept apart from the structural content, so that scalar
/// multiples of the same structure compare in O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Product {
    pub factor: BigRational,
    pub content: Vec<Tensor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Power {
    pub base: Tensor,
    pub exponent: Tensor,
}

/// Built-in scalar functions, opaque to expansion and substitution except
/// for traversal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
}

impl FunctionKind {
    pub fn name(self) -> &'static str {
        match self {
            FunctionKind::Sin => "Sin",
            FunctionKind::Cos => "Cos",
            FunctionKind::Tan => "Tan",
            FunctionKind::Exp => "Exp",
            FunctionKind::Log => "Log",
            FunctionKind::Sqrt => "Sqrt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScalarFunction {
    pub kind: FunctionKind,
    pub arg: Tensor,
}

/// A named function applied to argument subtrees, carrying its own external
/// index signature (`f_{m}[x_{a}]`). Arguments are independent index scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: NameId,
    pub indices: Vec<Index>,
    pub args: Vec<Tensor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Number(BigRational),
    Simple(SimpleTensor),
    Sum(Sum),
    Product(Product),
    Power(Power),
    Function(ScalarFunction),
    Field(Field),
}

/// A handle to an immutable expression tree node.
#[derive(Clone)]
pub struct Tensor(Rc<Node>);

impl Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Tensor {
    /// Wraps a node without any normalization. The smart constructors in
    /// [`builders`] are the usual entry points.
    pub fn raw(node: Node) -> Self {
        Tensor(Rc::new(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Reference identity: the "unchanged subtree ⇒ same handle" contract.
    pub fn same_node(a: &Tensor, b: &Tensor) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn as_number(&self) -> Option<&BigRational> {
        match self.node() {
            Node::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleTensor> {
        match self.node() {
            Node::Simple(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sum(&self) -> Option<&Sum> {
        match self.node() {
            Node::Sum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_product(&self) -> Option<&Product> {
        match self.node() {
            Node::Product(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_power(&self) -> Option<&Power> {
        match self.node() {
            Node::Power(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self.node() {
            Node::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_sum(&self) -> bool {
        matches!(self.node(), Node::Sum(_))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.node(), Node::Number(n) if num::Zero::is_zero(n))
    }

    pub fn is_one(&self) -> bool {
        matches!(self.node(), Node::Number(n) if num::One::is_one(n))
    }

    /// The exponent as an integer, when the node is a power with a literal
    /// integer exponent.
    pub fn integer_exponent(&self) -> Option<i64> {
        let power = self.as_power()?;
        let n = power.exponent.as_number()?;
        if !n.is_integer() {
            return None;
        }
        num::ToPrimitive::to_i64(&n.to_integer())
    }

    /// True for the only case the expansion engine rewrites specially: a
    /// positive integer power of a sum.
    pub fn is_expandable_power(&self) -> bool {
        match (self.as_power(), self.integer_exponent()) {
            (Some(power), Some(n)) => n >= 1 && power.base.is_sum(),
            _ => false,
        }
    }

    /// Number of traversable children.
    pub fn child_count(&self) -> usize {
        match self.node() {
            Node::Number(_) | Node::Simple(_) => 0,
            Node::Sum(s) => s.addends.len(),
            Node::Product(p) => p.content.len(),
            Node::Power(_) => 2,
            Node::Function(_) => 1,
            Node::Field(f) => f.args.len(),
        }
    }

    pub fn child(&self, i: usize) -> Option<&Tensor> {
        match self.node() {
            Node::Number(_) | Node::Simple(_) => None,
            Node::Sum(s) => s.addends.get(i),
            Node::Product(p) => p.content.get(i),
            Node::Power(p) => match i {
                0 => Some(&p.base),
                1 => Some(&p.exponent),
                _ => None,
            },
            Node::Function(f) => (i == 0).then_some(&f.arg),
            Node::Field(f) => f.args.get(i),
        }
    }

    /// Rebuilds this node around replacement children, re-normalizing
    /// through the smart constructors. `children` must have
    /// [`Tensor::child_count`] entries.
    pub fn with_children(&self, children: Vec<Tensor>) -> Tensor {
        debug_assert_eq!(children.len(), self.child_count());
        match self.node() {
            Node::Number(_) | Node::Simple(_) => self.clone(),
            Node::Sum(_) => Tensor::sum(children),
            Node::Product(p) => Tensor::product(p.factor.clone(), children),
            Node::Power(_) => {
                let mut it = children.into_iter();
                let base = it.next().expect("power base");
                let exponent = it.next().expect("power exponent");
                Tensor::power(base, exponent)
            }
            Node::Function(f) => {
                let mut it = children.into_iter();
                Tensor::function(f.kind, it.next().expect("function argument"))
            }
            Node::Field(f) => Tensor::field(f.name, f.indices.clone(), children),
        }
    }
}

/// Structural equality with a reference-identity fast path. Sums and
/// products are canonically ordered by construction, so content compares
/// positionally.
impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        Tensor::same_node(self, other) || self.node() == other.node()
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node().hash(state)
    }
}
