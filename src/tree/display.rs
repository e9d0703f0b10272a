//! Rendering trees against a [`Context`].
//!
//! Symbol names live in the session registry, so a tree displays through
//! [`Context::show`] (or the [`DisplayTensor`] adapter), not through a bare
//! `Display` impl. The output round-trips through the parser.

use num::{BigRational, One, Signed};
use std::fmt::{self, Display, Write};

use super::{builders::negative_head, Node, Tensor};
use crate::context::Context;
use crate::structure::{Index, Polarity};

/// Borrowing adapter implementing [`Display`].
pub struct DisplayTensor<'a> {
    pub(crate) tensor: &'a Tensor,
    pub(crate) ctx: &'a Context,
}

impl Display for DisplayTensor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_tensor(&mut out, self.tensor, self.ctx).map_err(|_| fmt::Error)?;
        f.write_str(&out)
    }
}

fn write_rational(out: &mut String, n: &BigRational) -> fmt::Result {
    if n.is_integer() {
        write!(out, "{}", n.to_integer())
    } else {
        write!(out, "{}/{}", n.numer(), n.denom())
    }
}

/// Writes an index signature, grouping runs of equal polarity:
/// `_{mn}^{ab}`.
pub(crate) fn write_signature(out: &mut String, indices: &[Index]) -> fmt::Result {
    let mut i = 0;
    while i < indices.len() {
        let polarity = indices[i].polarity;
        let marker = match polarity {
            Polarity::Upper => '^',
            Polarity::Lower => '_',
        };
        write!(out, "{marker}{{")?;
        while i < indices.len() && indices[i].polarity == polarity {
            write!(out, "{}", indices[i].name)?;
            i += 1;
        }
        write!(out, "}}")?;
    }
    Ok(())
}

fn needs_parens_in_product(t: &Tensor) -> bool {
    matches!(t.node(), Node::Sum(_)) || negative_head(t)
}

fn needs_parens_in_power(t: &Tensor) -> bool {
    matches!(
        t.node(),
        Node::Sum(_) | Node::Product(_) | Node::Power(_)
    ) || matches!(t.node(), Node::Number(n) if n.is_negative() || !n.is_integer())
}

fn write_tensor(out: &mut String, t: &Tensor, ctx: &Context) -> fmt::Result {
    match t.node() {
        Node::Number(n) => write_rational(out, n),
        Node::Simple(s) => {
            write!(out, "{}", ctx.name_str(s.name))?;
            write_signature(out, &s.indices)
        }
        Node::Field(field) => {
            write!(out, "{}", ctx.name_str(field.name))?;
            write_signature(out, &field.indices)?;
            write!(out, "[")?;
            for (i, arg) in field.args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write_tensor(out, arg, ctx)?;
            }
            write!(out, "]")
        }
        Node::Function(f) => {
            write!(out, "{}[", f.kind.name())?;
            write_tensor(out, &f.arg, ctx)?;
            write!(out, "]")
        }
        Node::Power(p) => {
            if needs_parens_in_power(&p.base) {
                write!(out, "(")?;
                write_tensor(out, &p.base, ctx)?;
                write!(out, ")")?;
            } else {
                write_tensor(out, &p.base, ctx)?;
            }
            write!(out, "^")?;
            if needs_parens_in_power(&p.exponent) {
                write!(out, "(")?;
                write_tensor(out, &p.exponent, ctx)?;
                write!(out, ")")
            } else {
                write_tensor(out, &p.exponent, ctx)
            }
        }
        Node::Product(p) => {
            let mut first = true;
            if p.factor == -BigRational::one() {
                write!(out, "-")?;
            } else if !p.factor.is_one() {
                write_rational(out, &p.factor)?;
                first = false;
            }
            for factor in &p.content {
                if !first {
                    write!(out, "*")?;
                }
                first = false;
                if needs_parens_in_product(factor) {
                    write!(out, "(")?;
                    write_tensor(out, factor, ctx)?;
                    write!(out, ")")?;
                } else {
                    write_tensor(out, factor, ctx)?;
                }
            }
            Ok(())
        }
        Node::Sum(s) => {
            for (i, addend) in s.addends.iter().enumerate() {
                if i > 0 {
                    if negative_head(addend) {
                        write!(out, " - ")?;
                        write_negated_magnitude(out, addend, ctx)?;
                        continue;
                    }
                    write!(out, " + ")?;
                }
                write_tensor(out, addend, ctx)?;
            }
            Ok(())
        }
    }
}

/// Writes the magnitude of an addend whose head is negative.
fn write_negated_magnitude(out: &mut String, addend: &Tensor, ctx: &Context) -> fmt::Result {
    match addend.node() {
        Node::Number(n) => write_rational(out, &-n.clone()),
        Node::Product(p) => {
            let flipped = Tensor::product(-p.factor.clone(), p.content.clone());
            write_tensor(out, &flipped, ctx)
        }
        _ => write_tensor(out, addend, ctx),
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;

    #[test]
    fn round_trip_simple_expressions() {
        let ctx = Context::new();
        for text in [
            "a + b",
            "2*a*b",
            "A_{mn}*B^{n}",
            "(a + b)^2",
            "Sin[x + y]",
            "a - b",
            "1/2*a",
            "g_{ab}*d^{a}_{c}",
        ] {
            let parsed = ctx.parse(text).unwrap();
            let shown = ctx.show(&parsed);
            let reparsed = ctx.parse(&shown).unwrap();
            assert_eq!(parsed, reparsed, "{text} -> {shown}");
        }
    }
}
