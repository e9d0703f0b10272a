//! Pattern-matching substitution.
//!
//! A [`Substitution`] compiles a set of `lhs = rhs` rules and applies them
//! in one post-order pass over a tree. At each node the rules are tried in
//! registration order and the first one that fires ends that node's pass;
//! [`Substitution::repeated`] re-runs the list at the node until it
//! stabilizes instead. Product and sum patterns match
//! partially (unmatched factors and addends are kept) and repeatedly at one
//! node, so disjoint occurrences are all consumed; everything else matches
//! the visited node as a whole. Replacements are instantiated with the
//! matched index mapping, with their own dummies renamed away from every
//! name in play.

use ahash::AHashSet;
use thiserror::Error;

use super::Transformation;
use crate::context::Context;
use crate::iterators::{Event, ScopedIterator};
use crate::mapping::{instantiate, IndexMapping};
use crate::parse::ParseError;
use crate::structure::{FreshNames, IndexName};
use crate::tree::{Node, Tensor};

mod matcher;
use matcher::{assign_units, mappings, match_sum, unfold_powers};

#[derive(Error, Debug)]
pub enum SubstitutionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("left and right sides of a rule must carry the same free indices")]
    FreeIndicesMismatch,
}

#[derive(Clone)]
enum Applicator {
    /// Match the visited node as a whole.
    Whole,
    /// Match a sub-multiset of product factors, keeping the leftover.
    Product,
    /// Match a subset of sum addends, keeping the leftover.
    Sum,
}

#[derive(Clone)]
struct Rule {
    from: Tensor,
    to: Tensor,
    applicator: Applicator,
    free: AHashSet<IndexName>,
}

/// The substitution engine.
#[derive(Clone)]
pub struct Substitution {
    ctx: Context,
    rules: Vec<Rule>,
    repeat: bool,
}

impl Substitution {
    /// Compiles `(from, to)` pairs. Both sides of a rule must carry the
    /// same free indices; a replacement that is identically zero is exempt.
    pub fn new(
        ctx: &Context,
        rules: impl IntoIterator<Item = (Tensor, Tensor)>,
    ) -> Result<Self, SubstitutionError> {
        let mut compiled = Vec::new();
        for (from, to) in rules {
            if !to.is_zero() && from.free_indices() != to.free_indices() {
                return Err(SubstitutionError::FreeIndicesMismatch);
            }
            let applicator = match from.node() {
                Node::Product(_) => Applicator::Product,
                Node::Sum(_) => Applicator::Sum,
                _ => Applicator::Whole,
            };
            let free = from.free_names();
            compiled.push(Rule {
                from,
                to,
                applicator,
                free,
            });
        }
        Ok(Substitution {
            ctx: ctx.clone(),
            rules: compiled,
            repeat: false,
        })
    }

    pub fn single(ctx: &Context, from: Tensor, to: Tensor) -> Result<Self, SubstitutionError> {
        Self::new(ctx, [(from, to)])
    }

    /// Parses each text as a `lhs = rhs` rule.
    pub fn parse(ctx: &Context, rules: &[&str]) -> Result<Self, SubstitutionError> {
        let mut parsed = Vec::with_capacity(rules.len());
        for text in rules {
            parsed.push(ctx.parse_rule(text)?);
        }
        Self::new(ctx, parsed)
    }

    /// Re-applies the rule set to a rewritten node until it stabilizes,
    /// instead of the default first-match-wins pass per node. Rule sets
    /// that grow their own matches will not terminate under this mode.
    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    fn apply_at(&self, node: &Tensor, forbidden: &AHashSet<IndexName>) -> Option<Tensor> {
        let mut forbidden = forbidden.clone();
        let mut fresh = FreshNames::above(forbidden.iter());
        let mut current = node.clone();
        let mut changed = false;
        loop {
            let mut progressed = false;
            for rule in &self.rules {
                if let Some(next) = rule.apply(&current, &mut forbidden, &self.ctx, &mut fresh) {
                    for name in next.all_index_names() {
                        forbidden.insert(name);
                        fresh.note(name);
                    }
                    current = next;
                    changed = true;
                    progressed = true;
                    // first match wins; repeated mode keeps trying the rest
                    if !self.repeat {
                        break;
                    }
                }
            }
            if !progressed || !self.repeat {
                break;
            }
        }
        changed.then_some(current)
    }
}

impl Transformation for Substitution {
    fn transform(&self, t: &Tensor) -> Tensor {
        let mut it = ScopedIterator::new(t);
        while let Some((event, node)) = it.next() {
            if event != Event::Leaving {
                continue;
            }
            let forbidden = it.forbidden().clone();
            if let Some(replaced) = self.apply_at(&node, &forbidden) {
                log::trace!("substitution fired at depth-first position");
                it.set(replaced);
            }
        }
        it.result()
    }
}

impl Rule {
    fn apply(
        &self,
        candidate: &Tensor,
        forbidden: &mut AHashSet<IndexName>,
        ctx: &Context,
        fresh: &mut FreshNames,
    ) -> Option<Tensor> {
        let result = match self.applicator {
            Applicator::Whole => self.apply_whole(candidate, forbidden, ctx, fresh),
            Applicator::Product => self.apply_product(candidate, forbidden, ctx, fresh),
            Applicator::Sum => self.apply_sum(candidate, forbidden, ctx, fresh),
        }?;
        (result != *candidate).then_some(result)
    }

    fn apply_whole(
        &self,
        candidate: &Tensor,
        forbidden: &mut AHashSet<IndexName>,
        ctx: &Context,
        fresh: &mut FreshNames,
    ) -> Option<Tensor> {
        let mapping = mappings(&self.from, candidate, &IndexMapping::new(), ctx)
            .into_iter()
            .next()?;
        Some(instantiate(&self.to, &mapping, forbidden, fresh))
    }

    fn apply_product(
        &self,
        candidate: &Tensor,
        forbidden: &mut AHashSet<IndexName>,
        ctx: &Context,
        fresh: &mut FreshNames,
    ) -> Option<Tensor> {
        let pattern = self.from.as_product().expect("product pattern");
        let pattern_units = unfold_powers(&pattern.content);
        let mut current = candidate.clone();
        let mut changed = false;
        loop {
            let Some(c) = current.as_product() else { break };
            let candidate_units = unfold_powers(&c.content);
            if pattern_units.len() > candidate_units.len() {
                break;
            }
            let Some((mapping, used)) =
                assign_units(&pattern_units, &candidate_units, IndexMapping::new(), ctx)
            else {
                break;
            };
            let scale = &c.factor / &pattern.factor;
            let mut pieces = vec![instantiate(&self.to, &mapping, forbidden, fresh)];
            for (j, unit) in candidate_units.iter().enumerate() {
                if !used[j] {
                    pieces.push(unit.clone());
                }
            }
            let next = Tensor::product(scale, pieces);
            if next == current {
                break;
            }
            for name in next.all_index_names() {
                forbidden.insert(name);
                fresh.note(name);
            }
            current = next;
            changed = true;
        }
        changed.then_some(current)
    }

    fn apply_sum(
        &self,
        candidate: &Tensor,
        forbidden: &mut AHashSet<IndexName>,
        ctx: &Context,
        fresh: &mut FreshNames,
    ) -> Option<Tensor> {
        let pattern = self.from.as_sum().expect("sum pattern");
        let mut current = candidate.clone();
        let mut changed = false;
        loop {
            let Some(c) = current.as_sum() else { break };
            if pattern.addends.len() > c.addends.len() {
                break;
            }
            let Some((mapping, used)) = match_sum(
                &pattern.addends,
                &c.addends,
                &IndexMapping::new(),
                &self.free,
                ctx,
            ) else {
                break;
            };
            let mut pieces = vec![instantiate(&self.to, &mapping, forbidden, fresh)];
            for (j, addend) in c.addends.iter().enumerate() {
                if !used[j] {
                    pieces.push(addend.clone());
                }
            }
            let next = Tensor::sum(pieces);
            if next == current {
                break;
            }
            for name in next.all_index_names() {
                forbidden.insert(name);
                fresh.note(name);
            }
            current = next;
            changed = true;
        }
        changed.then_some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitute(ctx: &Context, rule: &str, input: &str) -> Tensor {
        let s = Substitution::parse(ctx, &[rule]).unwrap();
        s.transform(&ctx.parse(input).unwrap())
    }

    #[test]
    fn simple_tensor_rule_maps_indices() {
        let ctx = Context::new();
        let result = substitute(&ctx, "A_{m} = B_{m} + C_{m}", "A_{a}*D^{a}");
        assert_eq!(result, ctx.parse("(B_{a} + C_{a})*D^{a}").unwrap());
    }

    #[test]
    fn replacement_dummies_dodge_the_tree() {
        let ctx = Context::new();
        let result = substitute(&ctx, "A_{m} = B_{m}*C_{q}*D^{q}", "A_{a}*E_{q}*F^{q}");
        result.check_index_consistency().unwrap();
        // q was taken, so the spliced contraction picked another name
        let shown = ctx.show(&result);
        assert!(shown.contains("B_{a}"), "{shown}");
        assert!(shown.contains("E_{q}"), "{shown}");
    }

    #[test]
    fn product_rule_is_order_insensitive_and_keeps_leftover() {
        let ctx = Context::new();
        let result = substitute(&ctx, "A_{m}*B^{m} = x", "3*B^{c}*K*A_{c}");
        assert_eq!(result, ctx.parse("3*x*K").unwrap());
    }

    #[test]
    fn antisymmetric_alignment_carries_the_sign() {
        let ctx = Context::new();
        let a = ctx.intern("A");
        ctx.declare_antisymmetric(a, 2).unwrap();
        let result = substitute(&ctx, "A_{mn}*B^{n} = C_{m}", "A_{ab}*B^{a}");
        assert_eq!(result, ctx.parse("-C_{b}").unwrap());
    }

    #[test]
    fn disjoint_product_matches_are_all_consumed() {
        let ctx = Context::new();
        let result = substitute(&ctx, "x*y = c", "x^2*y^2");
        assert_eq!(result, ctx.parse("c^2").unwrap());
    }

    #[test]
    fn partial_sum_match_keeps_the_rest() {
        let ctx = Context::new();
        let result = substitute(&ctx, "a + b = c", "a + b + d");
        assert_eq!(result, ctx.parse("c + d").unwrap());
    }

    #[test]
    fn self_substitution_is_stable() {
        let ctx = Context::new();
        let t = ctx.parse("x*y + A_{m}*B^{m}").unwrap();
        let s = Substitution::parse(&ctx, &["x = x", "A_{m} = A_{m}"]).unwrap();
        assert!(Tensor::same_node(&s.transform(&t), &t));
    }

    #[test]
    fn rules_must_balance_free_indices() {
        let ctx = Context::new();
        let from = ctx.parse("A_{m}").unwrap();
        let to = ctx.parse("x").unwrap();
        assert!(matches!(
            Substitution::single(&ctx, from, to),
            Err(SubstitutionError::FreeIndicesMismatch)
        ));
    }

    #[test]
    fn zero_replacements_are_exempt_from_the_balance_check() {
        let ctx = Context::new();
        let result = substitute(&ctx, "A_{m} = 0", "A_{a}*B^{a} + x");
        assert_eq!(result, ctx.parse("x").unwrap());
    }

    #[test]
    fn the_first_matching_rule_ends_the_pass() {
        let ctx = Context::new();
        let chain = Substitution::parse(&ctx, &["a = b", "b = c"]).unwrap();
        let t = ctx.parse("a").unwrap();
        assert_eq!(chain.transform(&t), ctx.parse("b").unwrap());
        assert_eq!(chain.repeated().transform(&t), ctx.parse("c").unwrap());
    }

    #[test]
    fn field_arguments_bind_into_the_replacement() {
        let ctx = Context::new();
        let result = substitute(&ctx, "f[x] = x^2", "f[z]");
        assert_eq!(result, ctx.parse("z^2").unwrap());
    }

    #[test]
    fn field_rules_map_external_indices_and_arguments_together() {
        let ctx = Context::new();
        let result = substitute(&ctx, "F_{m}[x] = x*V_{m}", "F_{a}[y + z]*W^{a}");
        assert_eq!(result, ctx.parse("(y + z)*V_{a}*W^{a}").unwrap());
    }

    #[test]
    fn repeated_field_arguments_must_bind_consistently() {
        let ctx = Context::new();
        let result = substitute(&ctx, "f[x, x] = x", "f[y, z]");
        assert_eq!(result, ctx.parse("f[y, z]").unwrap());
    }

    #[test]
    fn scalar_function_patterns_match_up_to_dummies() {
        let ctx = Context::new();
        let result = substitute(&ctx, "Sin[A_{m}*B^{m}] = x", "Sin[A_{q}*B^{q}]*y");
        assert_eq!(result, ctx.parse("x*y").unwrap());
    }
}
