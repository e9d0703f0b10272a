//! Streaming production of expansion terms.

use ahash::AHashSet;
use num::{BigRational, One};

use ahash::AHashMap;

use crate::mapping::{
    collect_scope_occurrences, multiply_with_rename, rename_in_scope, RELABEL_ROUNDS,
};
use crate::structure::{FreshNames, IndexName};
use crate::tree::{Node, Tensor};

/// Produces the terms of an expanded product one at a time, without ever
/// materializing the whole sum.
///
/// The sum factors of the product are stepped through with an odometer;
/// every produced term is a product of one addend per sum factor times the
/// non-sum rest, with dummies renamed away from the forbidden set so the
/// term can be spliced anywhere in the originating scope.
pub struct ExpandPort {
    factor: BigRational,
    rest: Vec<Tensor>,
    sums: Vec<Vec<Tensor>>,
    counters: Vec<usize>,
    exhausted: bool,
    forbidden: AHashSet<IndexName>,
    fresh: FreshNames,
}

impl ExpandPort {
    /// A port over the expansion of `t` in its own scope. Non-products are
    /// treated as single-factor products, so a bare sum streams its addends.
    pub fn new(t: &Tensor) -> Self {
        let forbidden = t.all_index_names();
        match t.node() {
            Node::Product(p) => {
                Self::with_forbidden(p.factor.clone(), p.content.clone(), forbidden)
            }
            _ => Self::with_forbidden(BigRational::one(), vec![t.clone()], forbidden),
        }
    }

    pub(crate) fn with_forbidden(
        factor: BigRational,
        content: Vec<Tensor>,
        forbidden: AHashSet<IndexName>,
    ) -> Self {
        let mut rest = Vec::new();
        let mut sums = Vec::new();
        for item in content {
            match item.node() {
                Node::Sum(s) => sums.push(s.addends.clone()),
                _ => rest.push(item),
            }
        }
        let counters = vec![0; sums.len()];
        let fresh = FreshNames::above(forbidden.iter());
        ExpandPort {
            factor,
            rest,
            sums,
            counters,
            exhausted: false,
            forbidden,
            fresh,
        }
    }

    /// How many terms the port produces in total.
    pub fn term_count(&self) -> usize {
        self.sums.iter().map(|s| s.len()).product()
    }

    /// The next term, or `None` once every addend combination was produced.
    pub fn take(&mut self) -> Option<Tensor> {
        if self.exhausted {
            return None;
        }
        let mut term = Tensor::product(self.factor.clone(), self.rest.clone());
        for (sum, &chosen) in self.sums.iter().zip(&self.counters) {
            term = multiply_with_rename(&term, &sum[chosen], &self.forbidden, &mut self.fresh);
        }
        self.advance();
        Some(canonize_dummies(&term, &self.forbidden))
    }

    fn advance(&mut self) {
        for i in 0..self.counters.len() {
            self.counters[i] += 1;
            if self.counters[i] < self.sums[i].len() {
                return;
            }
            self.counters[i] = 0;
        }
        self.exhausted = true;
    }
}

/// Relabels a term's dummies deterministically: distinct dummies take the
/// smallest names outside `forbidden`, in occurrence order. Terms that are
/// equal up to dummy renaming come out structurally equal, which lets the
/// sum constructor merge them into one addend with a numeric coefficient.
fn canonize_dummies(term: &Tensor, forbidden: &AHashSet<IndexName>) -> Tensor {
    let mut current = term.clone();
    for _ in 0..RELABEL_ROUNDS {
        let relabeled = canonize_once(&current, forbidden);
        if relabeled == current {
            break;
        }
        current = relabeled;
    }
    current
}

fn canonize_once(term: &Tensor, forbidden: &AHashSet<IndexName>) -> Tensor {
    let free = term.free_names();
    let mut order = Vec::new();
    collect_scope_occurrences(term, &mut order);

    let mut avoid = forbidden.clone();
    avoid.extend(free.iter().copied());
    let mut fresh = FreshNames::new();
    let mut map = AHashMap::new();
    for name in order {
        if free.contains(&name) || map.contains_key(&name) {
            continue;
        }
        let new = fresh.fresh(name.kind, &avoid);
        avoid.insert(new);
        map.insert(name, new);
    }
    map.retain(|from, to| *from != *to);
    rename_in_scope(term, &map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn streams_the_cartesian_product() {
        let ctx = Context::new();
        let t = ctx.parse("2*(a + b)*(c + e)").unwrap();
        let mut port = ExpandPort::new(&t);
        assert_eq!(port.term_count(), 4);
        let mut terms = Vec::new();
        while let Some(term) = port.take() {
            terms.push(ctx.show(&term));
        }
        assert_eq!(terms.len(), 4);
        assert!(terms.contains(&"2*a*c".to_string()));
        assert!(terms.contains(&"2*b*e".to_string()));
    }

    #[test]
    fn single_term_for_sumless_products() {
        let ctx = Context::new();
        let t = ctx.parse("3*a*b").unwrap();
        let mut port = ExpandPort::new(&t);
        assert_eq!(port.term_count(), 1);
        assert_eq!(ctx.show(&port.take().unwrap()), "3*a*b");
        assert!(port.take().is_none());
    }

    #[test]
    fn colliding_dummies_are_renamed_per_term() {
        let ctx = Context::new();
        // both sum factors contract over m internally
        let t = ctx.parse("(A_{m}*B^{m} + x)*(C_{m}*D^{m} + y)").unwrap();
        let mut port = ExpandPort::new(&t);
        while let Some(term) = port.take() {
            term.check_index_consistency().unwrap();
        }
    }
}
