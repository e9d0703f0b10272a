//! End-to-end metric elimination scenarios, alone and combined with the
//! other engines.

use num::{BigInt, BigRational};

use ricci::transformations::substitutions::Substitution;
use ricci::{eliminate_metrics, expand, EliminateMetrics, Expand, IndexKind, Tensor, Transformation};

mod common;
use common::{assert_equiv, ctx};

#[test]
fn chains_collapse_to_a_single_rename() {
    let ctx = ctx();
    let t = ctx.parse("g_{ab}*g^{bc}*g_{cd}*A^{d}").unwrap();
    assert_equiv(&ctx, &eliminate_metrics(&ctx, &t), "A_{a}");
}

#[test]
fn traces_fold_per_index_kind() {
    let ctx = ctx();
    ctx.set_dimension(IndexKind::Latin, BigRational::from(BigInt::from(3)));
    let latin = ctx.parse("g_{ab}*g^{ab}").unwrap();
    assert_eq!(eliminate_metrics(&ctx, &latin), Tensor::integer(3));
    // greek dimension was never registered
    let greek = ctx.parse("d^{\\mu}_{\\mu}").unwrap();
    assert!(Tensor::same_node(&eliminate_metrics(&ctx, &greek), &greek));
}

#[test]
fn deltas_rename_across_sums() {
    let ctx = ctx();
    let t = ctx.parse("d^{a}_{b}*(A^{b} + x*B^{b})").unwrap();
    let result = eliminate_metrics(&ctx, &t);
    result.check_index_consistency().unwrap();
    assert_equiv(&ctx, &result, "A^{a} + x*B^{a}");
}

#[test]
fn free_standing_metrics_survive() {
    let ctx = ctx();
    let t = ctx.parse("g_{ab}*A^{c} + g_{ab}*B^{c}").unwrap();
    assert!(Tensor::same_node(&eliminate_metrics(&ctx, &t), &t));
}

#[test]
fn substitute_then_eliminate() {
    let ctx = ctx();
    let s = Substitution::parse(&ctx, &["A_{m} = g_{mn}*V^{n}"]).unwrap();
    let t = ctx.parse("A_{a}*W^{a}").unwrap();
    let result = eliminate_metrics(&ctx, &s.transform(&t));
    result.check_index_consistency().unwrap();
    assert_equiv(&ctx, &result, "V_{a}*W^{a}");
}

#[test]
fn elimination_as_an_expansion_extra() {
    let ctx = ctx();
    let t = ctx.parse("(g_{ab}*A^{b} + A_{a})*C^{a}").unwrap();
    let expanded = Expand::new()
        .with_extra(EliminateMetrics::new(&ctx))
        .transform(&t);
    expanded.check_index_consistency().unwrap();
    // both terms collapse to the same contraction
    assert_equiv(&ctx, &expanded, "2*A_{a}*C^{a}");
}

#[test]
fn expand_then_eliminate_matches_eliminate_then_expand() {
    let ctx = ctx();
    let t = ctx.parse("g^{ab}*(A_{b} + B_{b})*C_{a}").unwrap();
    let left = eliminate_metrics(&ctx, &expand(&t));
    let right = expand(&eliminate_metrics(&ctx, &t));
    assert!(ctx.equivalent(&left, &right), "{}", ctx.show(&left));
}
