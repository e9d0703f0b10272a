//! Distribution of products over sums and of integer powers of sums.

use ahash::AHashSet;
use num::{BigRational, One};

use super::expand_port::ExpandPort;
use super::Transformation;
use crate::mapping::rename_dummies;
use crate::structure::{FreshNames, IndexName};
use crate::tree::{Node, Tensor};

/// Which parts of the tree the expansion touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExpandScope {
    /// Positive and negative integer powers, top-level products.
    #[default]
    Default,
    /// Everything, including function and field arguments and symbolic
    /// powers' bases.
    All,
    /// Only the numerator: negative powers are left untouched.
    Numerator,
    /// Only denominators: `S^-n` becomes `(expand(S^n))^-1`, everything
    /// outside negative powers stays.
    Denominator,
}

fn expands_positive(scope: ExpandScope) -> bool {
    !matches!(scope, ExpandScope::Denominator)
}

fn expands_negative(scope: ExpandScope) -> bool {
    !matches!(scope, ExpandScope::Numerator)
}

/// The expansion engine.
///
/// Extra transformations can be attached; they are applied to every term as
/// it is produced, which keeps intermediate sums small when the extras
/// collapse terms (metric elimination is the usual companion).
#[derive(Clone, Default)]
pub struct Expand {
    scope: ExpandScope,
    extras: Vec<Box<dyn Transformation>>,
}

impl Expand {
    pub fn new() -> Self {
        Expand::default()
    }

    pub fn all() -> Self {
        Expand {
            scope: ExpandScope::All,
            extras: Vec::new(),
        }
    }

    pub fn numerator() -> Self {
        Expand {
            scope: ExpandScope::Numerator,
            extras: Vec::new(),
        }
    }

    pub fn denominator() -> Self {
        Expand {
            scope: ExpandScope::Denominator,
            extras: Vec::new(),
        }
    }

    pub fn with_extra(mut self, extra: impl Transformation + 'static) -> Self {
        self.extras.push(Box::new(extra));
        self
    }
}

impl Transformation for Expand {
    fn transform(&self, t: &Tensor) -> Tensor {
        let forbidden = t.all_index_names();
        let fresh = FreshNames::above(forbidden.iter());
        let mut expander = Expander {
            extras: &self.extras,
            forbidden,
            fresh,
        };
        expander.rewrite(t, self.scope)
    }
}

pub fn expand(t: &Tensor) -> Tensor {
    Expand::new().transform(t)
}

pub fn expand_all(t: &Tensor) -> Tensor {
    Expand::all().transform(t)
}

pub fn expand_numerator(t: &Tensor) -> Tensor {
    Expand::numerator().transform(t)
}

pub fn expand_denominator(t: &Tensor) -> Tensor {
    Expand::denominator().transform(t)
}

struct Expander<'a> {
    extras: &'a [Box<dyn Transformation>],
    forbidden: AHashSet<IndexName>,
    fresh: FreshNames,
}

impl Expander<'_> {
    fn rewrite(&mut self, t: &Tensor, scope: ExpandScope) -> Tensor {
        match t.node() {
            Node::Number(_) | Node::Simple(_) => t.clone(),
            Node::Function(f) => {
                if scope != ExpandScope::All {
                    return t.clone();
                }
                let arg = self.rewrite(&f.arg, scope);
                if Tensor::same_node(&arg, &f.arg) {
                    t.clone()
                } else {
                    Tensor::function(f.kind, arg)
                }
            }
            Node::Field(f) => {
                if scope != ExpandScope::All {
                    return t.clone();
                }
                let args: Vec<Tensor> = f.args.iter().map(|a| self.rewrite(a, scope)).collect();
                if args
                    .iter()
                    .zip(&f.args)
                    .all(|(new, old)| Tensor::same_node(new, old))
                {
                    t.clone()
                } else {
                    Tensor::field(f.name, f.indices.clone(), args)
                }
            }
            Node::Sum(s) => {
                let addends: Vec<Tensor> =
                    s.addends.iter().map(|a| self.rewrite(a, scope)).collect();
                if addends
                    .iter()
                    .zip(&s.addends)
                    .all(|(new, old)| Tensor::same_node(new, old))
                {
                    t.clone()
                } else {
                    Tensor::sum(addends)
                }
            }
            Node::Power(_) => self.rewrite_power(t, scope),
            Node::Product(p) => {
                let factors: Vec<Tensor> =
                    p.content.iter().map(|f| self.rewrite(f, scope)).collect();
                let changed = !factors
                    .iter()
                    .zip(&p.content)
                    .all(|(new, old)| Tensor::same_node(new, old));
                if expands_positive(scope) && factors.iter().any(Tensor::is_sum) {
                    self.distribute(p.factor.clone(), factors)
                } else if changed {
                    Tensor::product(p.factor.clone(), factors)
                } else {
                    t.clone()
                }
            }
        }
    }

    fn rewrite_power(&mut self, t: &Tensor, scope: ExpandScope) -> Tensor {
        let power = t.as_power().expect("power node");
        match t.integer_exponent() {
            Some(n) if n >= 1 && expands_positive(scope) => {
                let base = self.rewrite(&power.base, scope);
                if base.is_sum() && n >= 2 {
                    self.power_of_sum(&base, n)
                } else if Tensor::same_node(&base, &power.base) {
                    t.clone()
                } else {
                    Tensor::power(base, power.exponent.clone())
                }
            }
            Some(n) if n <= -1 && expands_negative(scope) => {
                // roles flip inside a denominator, so the base expands fully
                let inner = match scope {
                    ExpandScope::All => scope,
                    _ => ExpandScope::Default,
                };
                let base = self.rewrite(&power.base, inner);
                if base.is_sum() && n <= -2 {
                    Tensor::power(self.power_of_sum(&base, -n), Tensor::integer(-1))
                } else if Tensor::same_node(&base, &power.base) {
                    t.clone()
                } else {
                    Tensor::power(base, power.exponent.clone())
                }
            }
            _ => {
                if scope != ExpandScope::All {
                    return t.clone();
                }
                let base = self.rewrite(&power.base, scope);
                let exponent = self.rewrite(&power.exponent, scope);
                if Tensor::same_node(&base, &power.base)
                    && Tensor::same_node(&exponent, &power.exponent)
                {
                    t.clone()
                } else {
                    Tensor::power(base, exponent)
                }
            }
        }
    }

    /// `base^n` for a sum base and `n >= 2`, built by repeated distribution.
    /// Every copy of the base gets its dummies renamed against everything
    /// already in play, so the flattened terms can live in one scope.
    fn power_of_sum(&mut self, base: &Tensor, n: i64) -> Tensor {
        log::trace!("expanding a sum of {} addends to the power {n}", {
            base.as_sum().map_or(1, |s| s.addends.len())
        });
        for name in base.all_index_names() {
            self.forbidden.insert(name);
            self.fresh.note(name);
        }
        let mut acc = base.clone();
        for _ in 1..n {
            let copy = rename_dummies(base, &self.forbidden, &mut self.fresh);
            for name in copy.all_index_names() {
                self.forbidden.insert(name);
            }
            acc = self.distribute(BigRational::one(), vec![acc, copy]);
        }
        acc
    }

    fn distribute(&mut self, factor: BigRational, factors: Vec<Tensor>) -> Tensor {
        let mut port = ExpandPort::with_forbidden(factor, factors, self.forbidden.clone());
        let mut terms = Vec::with_capacity(port.term_count());
        while let Some(term) = port.take() {
            terms.push(self.apply_extras(term));
        }
        let result = Tensor::sum(terms);
        for name in result.all_index_names() {
            self.forbidden.insert(name);
            self.fresh.note(name);
        }
        result
    }

    fn apply_extras(&self, term: Tensor) -> Tensor {
        let mut term = term;
        for extra in self.extras {
            term = extra.transform(&term);
        }
        term
    }
}
