//! Structural matching of patterns against candidates.
//!
//! Matching produces an [`IndexMapping`] from pattern index names to
//! candidate index names. Simple tensors are aligned through their declared
//! symmetry group; power bases and function arguments are compared up to
//! dummy renaming, since no index mapping can reach across a scope
//! boundary. Field arguments bind onto the candidate's arguments instead,
//! and the bindings are substituted into the instantiated replacement.

use ahash::AHashSet;

use crate::context::Context;
use crate::mapping::{canonical_form, extend_simple, IndexMapping};
use crate::structure::symmetry::Sign;
use crate::structure::IndexName;
use crate::tree::{Node, Tensor};

/// Power factors with integer exponents up to this are unfolded into unit
/// copies for multiset matching, so `x*y = c` can hit inside `x^2*y^2`.
const MAX_POWER_UNITS: i64 = 32;

/// All mappings of `pattern` onto `candidate` that extend `base`.
pub(crate) fn mappings(
    pattern: &Tensor,
    candidate: &Tensor,
    base: &IndexMapping,
    ctx: &Context,
) -> Vec<IndexMapping> {
    match (pattern.node(), candidate.node()) {
        (Node::Number(a), Node::Number(b)) => {
            if a == b {
                vec![base.clone()]
            } else {
                Vec::new()
            }
        }
        (Node::Simple(p), Node::Simple(c)) => extend_simple(p, c, base, ctx),
        (Node::Power(p), Node::Power(c)) => {
            if canonical_form(&p.base) == canonical_form(&c.base)
                && canonical_form(&p.exponent) == canonical_form(&c.exponent)
            {
                vec![base.clone()]
            } else {
                Vec::new()
            }
        }
        (Node::Function(p), Node::Function(c)) => {
            if p.kind == c.kind && canonical_form(&p.arg) == canonical_form(&c.arg) {
                vec![base.clone()]
            } else {
                Vec::new()
            }
        }
        (Node::Field(p), Node::Field(c)) => {
            if p.name != c.name
                || p.indices.len() != c.indices.len()
                || p.args.len() != c.args.len()
            {
                return Vec::new();
            }
            let mut mapping = base.clone();
            // each pattern argument binds onto the candidate's; a pattern
            // argument in several slots must bind the same way everywhere
            for (from, to) in p.args.iter().zip(&c.args) {
                if !mapping.bind_argument(from, to) {
                    return Vec::new();
                }
            }
            for (from, to) in p.indices.iter().zip(&c.indices) {
                if from.polarity != to.polarity || !mapping.try_insert(from.name, to.name) {
                    return Vec::new();
                }
            }
            vec![mapping]
        }
        (Node::Product(p), Node::Product(c)) => {
            if p.factor != c.factor {
                return Vec::new();
            }
            let pattern_units = unfold_powers(&p.content);
            let candidate_units = unfold_powers(&c.content);
            if pattern_units.len() != candidate_units.len() {
                return Vec::new();
            }
            match assign_units(&pattern_units, &candidate_units, base.clone(), ctx) {
                Some((mapping, _)) => vec![mapping],
                None => Vec::new(),
            }
        }
        (Node::Sum(p), Node::Sum(c)) => {
            if p.addends.len() != c.addends.len() {
                return Vec::new();
            }
            let free = pattern.free_names();
            match match_sum(&p.addends, &c.addends, base, &free, ctx) {
                Some((mapping, _)) => vec![mapping],
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Unfolds small integer powers into repeated unit factors.
pub(crate) fn unfold_powers(content: &[Tensor]) -> Vec<Tensor> {
    let mut units = Vec::with_capacity(content.len());
    for item in content {
        match (item.as_power(), item.integer_exponent()) {
            (Some(p), Some(n)) if (2..=MAX_POWER_UNITS).contains(&n) => {
                for _ in 0..n {
                    units.push(p.base.clone());
                }
            }
            _ => units.push(item.clone()),
        }
    }
    units
}

/// Finds an injective assignment of every pattern unit onto a distinct
/// candidate unit, all under one consistent mapping. Candidate units that
/// stay unused are the caller's leftover.
pub(crate) fn assign_units(
    pattern: &[Tensor],
    candidate: &[Tensor],
    base: IndexMapping,
    ctx: &Context,
) -> Option<(IndexMapping, Vec<bool>)> {
    let mut used = vec![false; candidate.len()];
    unit_search(pattern, candidate, 0, &mut used, base, ctx)
}

fn unit_search(
    pattern: &[Tensor],
    candidate: &[Tensor],
    k: usize,
    used: &mut Vec<bool>,
    current: IndexMapping,
    ctx: &Context,
) -> Option<(IndexMapping, Vec<bool>)> {
    if k == pattern.len() {
        return Some((current, used.clone()));
    }
    for j in 0..candidate.len() {
        if used[j] {
            continue;
        }
        for extended in mappings(&pattern[k], &candidate[j], &current, ctx) {
            used[j] = true;
            if let Some(hit) = unit_search(pattern, candidate, k + 1, used, extended, ctx) {
                return Some(hit);
            }
            used[j] = false;
        }
    }
    None
}

/// Matches every pattern addend onto a distinct candidate addend. Dummy
/// names are addend-local, so only entries for names free in the whole
/// pattern sum carry over between addends; the relative sign picked up by
/// symmetry alignment must be uniform across all addends.
pub(crate) fn match_sum(
    pattern: &[Tensor],
    candidate: &[Tensor],
    base: &IndexMapping,
    pattern_free: &AHashSet<IndexName>,
    ctx: &Context,
) -> Option<(IndexMapping, Vec<bool>)> {
    let mut used = vec![false; candidate.len()];
    sum_search(
        pattern,
        candidate,
        0,
        &mut used,
        base.clone(),
        None,
        pattern_free,
        ctx,
    )
}

#[allow(clippy::too_many_arguments)]
fn sum_search(
    pattern: &[Tensor],
    candidate: &[Tensor],
    k: usize,
    used: &mut Vec<bool>,
    current: IndexMapping,
    expected: Option<Sign>,
    pattern_free: &AHashSet<IndexName>,
    ctx: &Context,
) -> Option<(IndexMapping, Vec<bool>)> {
    if k == pattern.len() {
        let mut mapping = current;
        if expected == Some(Sign::Minus) {
            mapping.negate();
        }
        return Some((mapping, used.clone()));
    }
    for j in 0..candidate.len() {
        if used[j] {
            continue;
        }
        let mut neutral = current.clone();
        neutral.sign = Sign::Plus;
        for m in mappings(&pattern[k], &candidate[j], &neutral, ctx) {
            if let Some(sign) = expected {
                if m.sign != sign {
                    continue;
                }
            }
            let mut merged = current.clone();
            let mut consistent = true;
            for (from, to) in m.entries() {
                if pattern_free.contains(&from) && !merged.try_insert(from, to) {
                    consistent = false;
                    break;
                }
            }
            if !consistent || !merged.absorb_bindings(&m) {
                continue;
            }
            used[j] = true;
            if let Some(hit) = sum_search(
                pattern,
                candidate,
                k + 1,
                used,
                merged,
                expected.or(Some(m.sign)),
                pattern_free,
                ctx,
            ) {
                return Some(hit);
            }
            used[j] = false;
        }
    }
    None
}
