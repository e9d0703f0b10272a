//! Index mappings and renaming.
//!
//! A mapping is the witness produced by a successful match: a partial
//! injective function from pattern index names to candidate index names,
//! together with the sign picked up from antisymmetric permutations. The
//! search between two simple tensors enumerates the candidate's declared
//! symmetry group, so `A_{mn}` maps onto `A_{nm}` (with a sign, if `A` is
//! antisymmetric).
//!
//! Renaming is always scope-aware: a map threaded through a tree stops at
//! scalar scope boundaries (power bases/exponents, function and field
//! arguments), because no free index of the outer scope can occur inside
//! them — any equal-named index there is an unrelated local dummy.

use ahash::{AHashMap, AHashSet};

use crate::context::Context;
use crate::structure::symmetry::Sign;
use crate::structure::{FreshNames, IndexName};
use crate::tree::{Node, SimpleTensor, Tensor};

/// A signed, injective, partial map over index names, plus the field
/// argument bindings a match picked up along the way.
#[derive(Debug, Clone, Default)]
pub struct IndexMapping {
    map: AHashMap<IndexName, IndexName>,
    image: AHashSet<IndexName>,
    /// Pattern argument (in canonical form) paired with the candidate
    /// argument it stood for.
    bindings: Vec<(Tensor, Tensor)>,
    pub sign: Sign,
}

impl IndexMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, from: IndexName) -> Option<IndexName> {
        self.map.get(&from).copied()
    }

    pub fn maps_onto(&self, to: IndexName) -> bool {
        self.image.contains(&to)
    }

    /// Records `from -> to`, failing on a conflict with an existing entry
    /// or with injectivity.
    pub fn try_insert(&mut self, from: IndexName, to: IndexName) -> bool {
        if from.kind != to.kind {
            return false;
        }
        match self.map.get(&from) {
            Some(&existing) => existing == to,
            None => {
                if self.image.contains(&to) {
                    return false;
                }
                self.map.insert(from, to);
                self.image.insert(to);
                true
            }
        }
    }

    pub fn negate(&mut self) {
        self.sign = self.sign * Sign::Minus;
    }

    /// Records "pattern argument `from` stood for candidate argument `to`",
    /// failing when `from` is already bound to a different argument.
    pub fn bind_argument(&mut self, from: &Tensor, to: &Tensor) -> bool {
        self.bind_canonical(canonical_form(from), to)
    }

    fn bind_canonical(&mut self, key: Tensor, to: &Tensor) -> bool {
        for (bound, target) in &self.bindings {
            if *bound == key {
                return canonical_form(target) == canonical_form(to);
            }
        }
        self.bindings.push((key, to.clone()));
        true
    }

    /// Folds another mapping's bindings in, failing on a conflict.
    pub(crate) fn absorb_bindings(&mut self, other: &IndexMapping) -> bool {
        for (bound, target) in other.bindings.clone() {
            if !self.bind_canonical(bound, &target) {
                return false;
            }
        }
        true
    }

    /// Substitutes every bound pattern argument occurring in `t` with the
    /// candidate argument it matched, crossing scalar scope boundaries.
    pub fn apply_bindings(&self, t: &Tensor) -> Tensor {
        let mut current = t.clone();
        for (bound, target) in &self.bindings {
            current = replace_equal(&current, bound, target);
        }
        current
    }

    pub fn image_names(&self) -> impl Iterator<Item = IndexName> + '_ {
        self.image.iter().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (IndexName, IndexName)> + '_ {
        self.map.iter().map(|(&from, &to)| (from, to))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// All mappings of `pattern`'s signature onto `candidate`'s, one per
/// symmetry-group element that aligns kinds and polarities and extends
/// `base` consistently.
pub fn extend_simple(
    pattern: &SimpleTensor,
    candidate: &SimpleTensor,
    base: &IndexMapping,
    ctx: &Context,
) -> Vec<IndexMapping> {
    if pattern.name != candidate.name || pattern.indices.len() != candidate.indices.len() {
        return Vec::new();
    }
    let degree = pattern.indices.len();
    let mut found = Vec::new();
    for symmetry in ctx.symmetries_of(pattern.name, degree) {
        let permuted = symmetry.permutation.apply(&pattern.indices);
        let mut mapping = base.clone();
        if symmetry.sign == Sign::Minus {
            mapping.negate();
        }
        let mut ok = true;
        for (from, to) in permuted.iter().zip(candidate.indices.iter()) {
            if from.polarity != to.polarity || !mapping.try_insert(from.name, to.name) {
                ok = false;
                break;
            }
        }
        if ok && !found_duplicate(&found, &mapping) {
            found.push(mapping);
        }
    }
    found
}

fn found_duplicate(found: &[IndexMapping], candidate: &IndexMapping) -> bool {
    found
        .iter()
        .any(|m| m.sign == candidate.sign && m.map == candidate.map)
}

/// The first mapping of one simple tensor onto another, if any.
pub fn first_mapping(
    pattern: &SimpleTensor,
    candidate: &SimpleTensor,
    ctx: &Context,
) -> Option<IndexMapping> {
    extend_simple(pattern, candidate, &IndexMapping::new(), ctx)
        .into_iter()
        .next()
}

/// Applies a name map to every in-scope index occurrence. Returns the same
/// handle when nothing matched.
pub fn rename_in_scope(t: &Tensor, map: &AHashMap<IndexName, IndexName>) -> Tensor {
    if map.is_empty() {
        return t.clone();
    }
    match t.node() {
        Node::Number(_) | Node::Power(_) | Node::Function(_) => t.clone(),
        Node::Simple(s) => {
            if s.indices.iter().any(|i| map.contains_key(&i.name)) {
                let indices = s
                    .indices
                    .iter()
                    .map(|i| match map.get(&i.name) {
                        Some(&new) => i.renamed(new),
                        None => *i,
                    })
                    .collect();
                Tensor::simple(s.name, indices)
            } else {
                t.clone()
            }
        }
        Node::Field(f) => {
            if f.indices.iter().any(|i| map.contains_key(&i.name)) {
                let indices = f
                    .indices
                    .iter()
                    .map(|i| match map.get(&i.name) {
                        Some(&new) => i.renamed(new),
                        None => *i,
                    })
                    .collect();
                Tensor::field(f.name, indices, f.args.clone())
            } else {
                t.clone()
            }
        }
        Node::Sum(s) => {
            let renamed: Vec<Tensor> = s.addends.iter().map(|a| rename_in_scope(a, map)).collect();
            if renamed
                .iter()
                .zip(s.addends.iter())
                .all(|(new, old)| Tensor::same_node(new, old))
            {
                t.clone()
            } else {
                Tensor::sum(renamed)
            }
        }
        Node::Product(p) => {
            let renamed: Vec<Tensor> = p.content.iter().map(|f| rename_in_scope(f, map)).collect();
            if renamed
                .iter()
                .zip(p.content.iter())
                .all(|(new, old)| Tensor::same_node(new, old))
            {
                t.clone()
            } else {
                Tensor::product(p.factor.clone(), renamed)
            }
        }
    }
}

/// Renames the scope dummies of `t` that collide with `forbidden` to fresh
/// names outside both `forbidden` and everything `t` already uses.
pub fn rename_dummies(
    t: &Tensor,
    forbidden: &AHashSet<IndexName>,
    fresh: &mut FreshNames,
) -> Tensor {
    let dummies = t.dummy_names();
    let colliding: Vec<IndexName> = dummies.iter().filter(|d| forbidden.contains(d)).copied().collect();
    if colliding.is_empty() {
        return t.clone();
    }
    let mut avoid = forbidden.clone();
    avoid.extend(t.all_index_names());
    let mut map = AHashMap::new();
    let mut ordered = colliding;
    ordered.sort();
    for dummy in ordered {
        let replacement = fresh.fresh(dummy.kind, &avoid);
        avoid.insert(replacement);
        map.insert(dummy, replacement);
    }
    rename_in_scope(t, &map)
}

/// Multiplies two tensors, renaming dummies of `b` that would collide with
/// the names of `a` or with `forbidden` into fresh ones. This is the safe
/// multiplication used during expansion, where the operands come from
/// previously unrelated scopes.
pub fn multiply_with_rename(
    a: &Tensor,
    b: &Tensor,
    forbidden: &AHashSet<IndexName>,
    fresh: &mut FreshNames,
) -> Tensor {
    let mut avoid = forbidden.clone();
    avoid.extend(a.all_index_names());
    // free indices shared between the two operands contract, so they must
    // survive the renaming
    for index in b.free_indices() {
        avoid.remove(&index.name);
    }
    let b = rename_dummies(b, &avoid, fresh);
    Tensor::mul(a.clone(), b)
}

/// Instantiates a rule's replacement: free indices renamed through the
/// mapping, dummies renamed fresh outside `forbidden`, bound field
/// arguments substituted in, the whole thing negated when the mapping
/// carries an odd sign.
pub fn instantiate(
    to: &Tensor,
    mapping: &IndexMapping,
    forbidden: &AHashSet<IndexName>,
    fresh: &mut FreshNames,
) -> Tensor {
    let mut avoid: AHashSet<IndexName> = forbidden.clone();
    avoid.extend(mapping.image_names());

    // dummies first, so a dummy sharing a name with a mapping target cannot
    // capture it
    let renamed = rename_dummies(to, &avoid, fresh);

    let mut free_map = AHashMap::new();
    for index in renamed.free_indices() {
        if let Some(target) = mapping.get(index.name) {
            free_map.insert(index.name, target);
        }
    }
    let mapped = rename_in_scope(&renamed, &free_map);
    let bound = mapping.apply_bindings(&mapped);
    if mapping.sign == Sign::Minus {
        bound.neg()
    } else {
        bound
    }
}

/// Replaces every subtree whose canonical form equals `from` (itself
/// already canonical) with `to`. Returns the same handle when nothing
/// matched.
fn replace_equal(t: &Tensor, from: &Tensor, to: &Tensor) -> Tensor {
    if canonical_form(t) == *from {
        return to.clone();
    }
    if t.child_count() == 0 {
        return t.clone();
    }
    let rebuilt: Vec<Tensor> = (0..t.child_count())
        .map(|i| replace_equal(t.child(i).expect("child in range"), from, to))
        .collect();
    let untouched = rebuilt
        .iter()
        .enumerate()
        .all(|(i, new)| Tensor::same_node(new, t.child(i).expect("child in range")));
    if untouched {
        t.clone()
    } else {
        t.with_children(rebuilt)
    }
}

/// Relabel-and-reorder passes before a dummy relabeling is declared stable;
/// the canonical order depends on the labels and vice versa, so both
/// relabeling loops iterate under the same bound.
pub(crate) const RELABEL_ROUNDS: usize = 6;

/// A deterministic relabeling of every scope's dummies, used to compare
/// trees up to dummy renaming. Iterates relabel-and-reorder to a fixed
/// point.
pub fn canonical_form(t: &Tensor) -> Tensor {
    let mut current = t.clone();
    for _ in 0..RELABEL_ROUNDS {
        let mut counter = 0u32;
        let next = canonical_pass(&current, &mut counter);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

// temp ids live far above anything user input produces
const CANONICAL_BASE: u32 = 1 << 24;

fn canonical_pass(t: &Tensor, counter: &mut u32) -> Tensor {
    let free = t.free_names();
    let mut occurrences = Vec::new();
    collect_scope_occurrences(t, &mut occurrences);
    let mut map = AHashMap::new();
    for name in occurrences {
        if !free.contains(&name) && !map.contains_key(&name) {
            map.insert(name, IndexName::new(name.kind, CANONICAL_BASE + *counter));
            *counter += 1;
        }
    }
    let renamed = rename_in_scope(t, &map);
    descend_opaque(&renamed, counter)
}

fn descend_opaque(t: &Tensor, counter: &mut u32) -> Tensor {
    match t.node() {
        Node::Number(_) | Node::Simple(_) => t.clone(),
        Node::Power(p) => Tensor::power(
            canonical_pass(&p.base, counter),
            canonical_pass(&p.exponent, counter),
        ),
        Node::Function(f) => Tensor::function(f.kind, canonical_pass(&f.arg, counter)),
        Node::Field(f) => Tensor::field(
            f.name,
            f.indices.clone(),
            f.args.iter().map(|a| canonical_pass(a, counter)).collect(),
        ),
        Node::Sum(s) => Tensor::sum(s.addends.iter().map(|a| descend_opaque(a, counter)).collect()),
        Node::Product(p) => Tensor::product(
            p.factor.clone(),
            p.content.iter().map(|f| descend_opaque(f, counter)).collect(),
        ),
    }
}

/// Index names of the current scope in occurrence order, duplicates kept.
pub(crate) fn collect_scope_occurrences(t: &Tensor, out: &mut Vec<IndexName>) {
    match t.node() {
        Node::Number(_) | Node::Power(_) | Node::Function(_) => {}
        Node::Simple(s) => out.extend(s.indices.iter().map(|i| i.name)),
        Node::Field(f) => out.extend(f.indices.iter().map(|i| i.name)),
        Node::Sum(s) => {
            for addend in &s.addends {
                collect_scope_occurrences(addend, out);
            }
        }
        Node::Product(p) => {
            for factor in &p.content {
                collect_scope_occurrences(factor, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Index, IndexKind};

    fn name(id: u32) -> IndexName {
        IndexName::new(IndexKind::Latin, id)
    }

    #[test]
    fn mapping_is_injective_and_consistent() {
        let mut m = IndexMapping::new();
        assert!(m.try_insert(name(0), name(5)));
        assert!(m.try_insert(name(0), name(5)));
        assert!(!m.try_insert(name(0), name(6)));
        assert!(!m.try_insert(name(1), name(5)));
        assert!(m.try_insert(name(1), name(6)));
    }

    #[test]
    fn first_mapping_respects_polarity() {
        let ctx = Context::new();
        let a = ctx.intern("A");
        let pattern = SimpleTensor {
            name: a,
            indices: vec![Index::lower(name(0)), Index::upper(name(1))],
        };
        let same = SimpleTensor {
            name: a,
            indices: vec![Index::lower(name(2)), Index::upper(name(3))],
        };
        let mapping = first_mapping(&pattern, &same, &ctx).expect("maps");
        assert_eq!(mapping.get(name(0)), Some(name(2)));
        assert_eq!(mapping.get(name(1)), Some(name(3)));
        assert_eq!(mapping.sign, Sign::Plus);

        let flipped = SimpleTensor {
            name: a,
            indices: vec![Index::upper(name(2)), Index::lower(name(3))],
        };
        assert!(first_mapping(&pattern, &flipped, &ctx).is_none());
    }

    #[test]
    fn antisymmetric_swap_carries_sign() {
        let ctx = Context::new();
        let a = ctx.intern("A");
        ctx.declare_antisymmetric(a, 2).unwrap();
        let pattern = SimpleTensor {
            name: a,
            indices: vec![Index::lower(name(0)), Index::upper(name(1))],
        };
        // indices come in the transposed polarity order: only the swapped
        // alignment matches
        let candidate = SimpleTensor {
            name: a,
            indices: vec![Index::upper(name(2)), Index::lower(name(3))],
        };
        let mapping = first_mapping(&pattern, &candidate, &ctx).expect("swap match");
        assert_eq!(mapping.sign, Sign::Minus);
        assert_eq!(mapping.get(name(0)), Some(name(3)));
        assert_eq!(mapping.get(name(1)), Some(name(2)));
    }

    #[test]
    fn rename_stops_at_scalar_scopes() {
        let ctx = Context::new();
        let t = ctx.parse("A_{m}*Sin[B_{m}*B^{m}]").unwrap();
        let mut map = AHashMap::new();
        map.insert(name(12), name(20)); // m -> u
        let renamed = rename_in_scope(&t, &map);
        let shown = ctx.show(&renamed);
        assert!(shown.contains("A_{u}"), "{shown}");
        assert!(shown.contains("B_{m}"), "{shown}");
    }

    #[test]
    fn rename_dummies_avoids_forbidden() {
        let ctx = Context::new();
        let t = ctx.parse("A_{m}*B^{m}").unwrap();
        let mut forbidden = AHashSet::new();
        forbidden.insert(name(12)); // m
        let mut fresh = FreshNames::new();
        let renamed = rename_dummies(&t, &forbidden, &mut fresh);
        assert!(!renamed.all_index_names().contains(&name(12)));
        renamed.check_index_consistency().unwrap();
        // no collision -> same handle
        let untouched = rename_dummies(&t, &AHashSet::new(), &mut fresh);
        assert!(Tensor::same_node(&untouched, &t));
    }

    #[test]
    fn canonical_form_identifies_relabeled_dummies() {
        let ctx = Context::new();
        let a = ctx.parse("A_{m}*B^{m}").unwrap();
        let b = ctx.parse("A_{n}*B^{n}").unwrap();
        assert_ne!(a, b);
        assert_eq!(canonical_form(&a), canonical_form(&b));
    }

    #[test]
    fn instantiation_maps_free_and_renames_dummies() {
        let ctx = Context::new();
        let to = ctx.parse("B_{m}*C^{q}*D_{q}").unwrap();
        let mut mapping = IndexMapping::new();
        assert!(mapping.try_insert(name(12), name(0))); // m -> a
        let mut forbidden = AHashSet::new();
        forbidden.insert(name(16)); // q is taken outside
        let mut fresh = FreshNames::new();
        let built = instantiate(&to, &mapping, &forbidden, &mut fresh);
        let shown = ctx.show(&built);
        assert!(shown.contains("B_{a}"), "{shown}");
        assert!(!built.all_index_names().contains(&name(16)), "{shown}");
        built.check_index_consistency().unwrap();
    }
}
