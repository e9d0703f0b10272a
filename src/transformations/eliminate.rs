//! Metric and Kronecker delta elimination.
//!
//! Within every product scope, a metric factor contracted with another
//! occurrence is consumed by renaming that occurrence: `g_{ab}*A^{b}`
//! becomes `A_{a}`, `d^{a}_{b}*A^{b}` becomes `A^{a}`. Chains collapse link
//! by link (`g_{ab}*g^{bc}` leaves `d_{a}^{c}` behind, which is consumed in
//! turn), and a full trace `d^{a}_{a}` folds to the dimension registered for
//! its index kind, when one is.

use num::BigRational;

use super::Transformation;
use crate::context::Context;
use crate::structure::Index;
use crate::tree::{Node, Tensor};

/// The elimination engine. Holds the session handle for the metric and
/// delta symbol ids and the registered dimensions.
#[derive(Clone)]
pub struct EliminateMetrics {
    ctx: Context,
}

impl EliminateMetrics {
    pub fn new(ctx: &Context) -> Self {
        EliminateMetrics { ctx: ctx.clone() }
    }

    fn rewrite(&self, t: &Tensor) -> Tensor {
        let count = t.child_count();
        let mut children = Vec::with_capacity(count);
        let mut changed = false;
        for i in 0..count {
            let child = t.child(i).expect("child within count");
            let rewritten = self.rewrite(child);
            changed |= !Tensor::same_node(&rewritten, child);
            children.push(rewritten);
        }
        let rebuilt = if changed {
            t.with_children(children)
        } else {
            t.clone()
        };
        match rebuilt.node() {
            Node::Product(_) => self.contract(&rebuilt),
            Node::Simple(_) => self.fold_trace(&rebuilt),
            _ => rebuilt,
        }
    }

    fn contract(&self, t: &Tensor) -> Tensor {
        let Some(p) = t.as_product() else {
            return t.clone();
        };
        let mut factor = p.factor.clone();
        let mut content = p.content.clone();
        let mut changed = false;
        loop {
            let mut progressed = false;
            for i in 0..content.len() {
                if self.eliminate_at(&mut factor, &mut content, i) {
                    progressed = true;
                    changed = true;
                    break;
                }
            }
            if !progressed {
                break;
            }
        }
        if changed {
            Tensor::product(factor, content)
        } else {
            t.clone()
        }
    }

    /// Tries to consume the metric factor at position `i`. Each success
    /// removes one factor, so the caller's loop terminates.
    fn eliminate_at(
        &self,
        factor: &mut BigRational,
        content: &mut Vec<Tensor>,
        i: usize,
    ) -> bool {
        let (a, b) = match content[i].as_simple() {
            Some(s) if self.ctx.is_metric_kind(s.name) && s.indices.len() == 2 => {
                (s.indices[0], s.indices[1])
            }
            _ => return false,
        };
        if a.name == b.name {
            if a.polarity != b.polarity {
                if let Some(dim) = self.ctx.dimension(a.name.kind) {
                    *factor *= dim;
                    content.remove(i);
                    return true;
                }
            }
            return false;
        }
        for (slot, other) in [(b, a), (a, b)] {
            let target = slot.dual();
            for j in 0..content.len() {
                if j == i {
                    continue;
                }
                // only a free occurrence of the partner index is the other
                // half of this contraction
                if content[j].free_indices().contains(&target) {
                    let replaced = replace_index(&content[j], target, other);
                    content[j] = self.normalize_metric(&replaced);
                    content.remove(i);
                    return true;
                }
            }
        }
        false
    }

    fn fold_trace(&self, t: &Tensor) -> Tensor {
        let Some(s) = t.as_simple() else {
            return t.clone();
        };
        if !self.ctx.is_metric_kind(s.name) || s.indices.len() != 2 {
            return t.clone();
        }
        let (a, b) = (s.indices[0], s.indices[1]);
        if a.name == b.name && a.polarity != b.polarity {
            if let Some(dim) = self.ctx.dimension(a.name.kind) {
                return Tensor::number(dim);
            }
        }
        t.clone()
    }

    /// A metric whose polarities went mixed is really a delta (and the other
    /// way round); renaming keeps later traces recognizable.
    fn normalize_metric(&self, t: &Tensor) -> Tensor {
        let Some(s) = t.as_simple() else {
            return t.clone();
        };
        if !self.ctx.is_metric_kind(s.name) || s.indices.len() != 2 {
            return t.clone();
        }
        let proper = if s.indices[0].polarity == s.indices[1].polarity {
            self.ctx.metric()
        } else {
            self.ctx.delta()
        };
        if proper == s.name {
            t.clone()
        } else {
            Tensor::simple(proper, s.indices.clone())
        }
    }
}

impl Transformation for EliminateMetrics {
    fn transform(&self, t: &Tensor) -> Tensor {
        self.rewrite(t)
    }
}

pub fn eliminate_metrics(ctx: &Context, t: &Tensor) -> Tensor {
    EliminateMetrics::new(ctx).transform(t)
}

/// Replaces occurrences of exactly `from` (name and polarity) within the
/// scope of `t`.
fn replace_index(t: &Tensor, from: Index, to: Index) -> Tensor {
    match t.node() {
        Node::Number(_) | Node::Power(_) | Node::Function(_) => t.clone(),
        Node::Simple(s) => {
            if s.indices.contains(&from) {
                let indices = s
                    .indices
                    .iter()
                    .map(|&i| if i == from { to } else { i })
                    .collect();
                Tensor::simple(s.name, indices)
            } else {
                t.clone()
            }
        }
        Node::Field(f) => {
            if f.indices.contains(&from) {
                let indices = f
                    .indices
                    .iter()
                    .map(|&i| if i == from { to } else { i })
                    .collect();
                Tensor::field(f.name, indices, f.args.clone())
            } else {
                t.clone()
            }
        }
        Node::Sum(s) => Tensor::sum(
            s.addends
                .iter()
                .map(|a| replace_index(a, from, to))
                .collect(),
        ),
        Node::Product(p) => Tensor::product(
            p.factor.clone(),
            p.content
                .iter()
                .map(|f| replace_index(f, from, to))
                .collect(),
        ),
    }
}
