//! Canonical ordering of tree nodes.
//!
//! Sums and products keep their children in this order, which makes the
//! unordered-for-matching semantics of both cheap: two canonically built
//! lists compare positionally.

use std::cmp::Ordering;

use super::{FunctionKind, Node, Tensor};

fn variant_rank(node: &Node) -> u8 {
    match node {
        Node::Number(_) => 0,
        Node::Simple(_) => 1,
        Node::Power(_) => 2,
        Node::Function(_) => 3,
        Node::Field(_) => 4,
        Node::Product(_) => 5,
        Node::Sum(_) => 6,
    }
}

fn function_rank(kind: FunctionKind) -> u8 {
    match kind {
        FunctionKind::Sin => 0,
        FunctionKind::Cos => 1,
        FunctionKind::Tan => 2,
        FunctionKind::Exp => 3,
        FunctionKind::Log => 4,
        FunctionKind::Sqrt => 5,
    }
}

fn cmp_slices(a: &[Tensor], b: &[Tensor]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let c = canonical_cmp(x, y);
        if c != Ordering::Equal {
            return c;
        }
    }
    a.len().cmp(&b.len())
}

/// Total order over trees used for canonical sorting.
pub fn canonical_cmp(a: &Tensor, b: &Tensor) -> Ordering {
    if Tensor::same_node(a, b) {
        return Ordering::Equal;
    }
    let (na, nb) = (a.node(), b.node());
    let rank = variant_rank(na).cmp(&variant_rank(nb));
    if rank != Ordering::Equal {
        return rank;
    }
    match (na, nb) {
        (Node::Number(x), Node::Number(y)) => x.cmp(y),
        (Node::Simple(x), Node::Simple(y)) => x
            .name
            .cmp(&y.name)
            .then_with(|| x.indices.len().cmp(&y.indices.len()))
            .then_with(|| x.indices.cmp(&y.indices)),
        (Node::Power(x), Node::Power(y)) => canonical_cmp(&x.base, &y.base)
            .then_with(|| canonical_cmp(&x.exponent, &y.exponent)),
        (Node::Function(x), Node::Function(y)) => function_rank(x.kind)
            .cmp(&function_rank(y.kind))
            .then_with(|| canonical_cmp(&x.arg, &y.arg)),
        (Node::Field(x), Node::Field(y)) => x
            .name
            .cmp(&y.name)
            .then_with(|| x.indices.cmp(&y.indices))
            .then_with(|| cmp_slices(&x.args, &y.args)),
        (Node::Product(x), Node::Product(y)) => {
            cmp_slices(&x.content, &y.content).then_with(|| x.factor.cmp(&y.factor))
        }
        (Node::Sum(x), Node::Sum(y)) => cmp_slices(&x.addends, &y.addends),
        _ => unreachable!("variant ranks already compared"),
    }
}
