//! Smart constructors maintaining the tree invariants.
//!
//! Every constructor normalizes just enough to uphold the invariants listed
//! in [`crate::tree`]: flattening, numeric folding, merging of scalar
//! multiples, canonical ordering. None of them performs algebraic rewriting
//! beyond that; expansion and substitution are transformations, not
//! constructors.

use num::{BigInt, BigRational, One, Signed, Zero};

use super::order::canonical_cmp;
use super::{Field, FunctionKind, Node, Power, Product, ScalarFunction, SimpleTensor, Sum, Tensor};
use crate::context::NameId;
use crate::structure::Index;
use ahash::AHashMap;

impl Tensor {
    pub fn number(n: BigRational) -> Tensor {
        Tensor::raw(Node::Number(n))
    }

    pub fn integer(n: i64) -> Tensor {
        Tensor::number(BigRational::from(BigInt::from(n)))
    }

    pub fn rational(numer: i64, denom: i64) -> Tensor {
        Tensor::number(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    pub fn zero() -> Tensor {
        Tensor::integer(0)
    }

    pub fn one() -> Tensor {
        Tensor::integer(1)
    }

    pub fn simple(name: NameId, indices: Vec<Index>) -> Tensor {
        Tensor::raw(Node::Simple(SimpleTensor { name, indices }))
    }

    pub fn function(kind: FunctionKind, arg: Tensor) -> Tensor {
        Tensor::raw(Node::Function(ScalarFunction { kind, arg }))
    }

    pub fn field(name: NameId, indices: Vec<Index>, args: Vec<Tensor>) -> Tensor {
        Tensor::raw(Node::Field(Field {
            name,
            indices,
            args,
        }))
    }

    /// Builds a sum: flattens nested sums, folds numeric addends, merges
    /// scalar multiples of the same structure, orders canonically, and
    /// collapses degenerate cases.
    pub fn sum(addends: Vec<Tensor>) -> Tensor {
        let mut numeric = BigRational::zero();
        // stem -> accumulated coefficient, insertion order kept separately
        let mut coefficients: AHashMap<Vec<Tensor>, BigRational> = AHashMap::new();
        let mut stems: Vec<Vec<Tensor>> = Vec::new();

        let mut pending = addends;
        pending.reverse();
        while let Some(addend) = pending.pop() {
            match addend.node() {
                Node::Number(n) => numeric += n,
                Node::Sum(s) => {
                    for inner in s.addends.iter().rev() {
                        pending.push(inner.clone());
                    }
                }
                Node::Product(p) => {
                    let stem = p.content.clone();
                    match coefficients.get_mut(&stem) {
                        Some(c) => *c += &p.factor,
                        None => {
                            coefficients.insert(stem.clone(), p.factor.clone());
                            stems.push(stem);
                        }
                    }
                }
                _ => {
                    let stem = vec![addend.clone()];
                    match coefficients.get_mut(&stem) {
                        Some(c) => *c += BigRational::one(),
                        None => {
                            coefficients.insert(stem.clone(), BigRational::one());
                            stems.push(stem);
                        }
                    }
                }
            }
        }

        let mut result: Vec<Tensor> = Vec::with_capacity(stems.len() + 1);
        for stem in stems {
            let coefficient = coefficients
                .remove(&stem)
                .expect("stem recorded without coefficient");
            if coefficient.is_zero() {
                continue;
            }
            result.push(Tensor::product(coefficient, stem));
        }
        if !numeric.is_zero() {
            result.push(Tensor::number(numeric));
        }
        result.sort_by(canonical_cmp);

        match result.len() {
            0 => Tensor::zero(),
            1 => result.pop().expect("one addend"),
            _ => Tensor::raw(Node::Sum(Sum { addends: result })),
        }
    }

    /// Builds a product: flattens nested products, folds numbers into the
    /// scalar factor, groups repeated factors into powers (`x*x^2` becomes
    /// `x^3`), orders the content canonically, and collapses degenerate
    /// cases.
    pub fn product(factor: BigRational, content: Vec<Tensor>) -> Tensor {
        let mut factor = factor;
        // base -> accumulated numeric exponent, insertion order kept separately
        let mut exponents: AHashMap<Tensor, BigRational> = AHashMap::new();
        let mut bases: Vec<Tensor> = Vec::new();

        let mut pending = content;
        pending.reverse();
        while let Some(item) = pending.pop() {
            match item.node() {
                Node::Number(n) => factor *= n,
                Node::Product(p) => {
                    factor *= &p.factor;
                    for inner in p.content.iter().rev() {
                        pending.push(inner.clone());
                    }
                }
                Node::Power(p) if p.exponent.as_number().is_some() => {
                    let e = p.exponent.as_number().expect("numeric exponent").clone();
                    match exponents.get_mut(&p.base) {
                        Some(acc) => *acc += e,
                        None => {
                            exponents.insert(p.base.clone(), e);
                            bases.push(p.base.clone());
                        }
                    }
                }
                _ => match exponents.get_mut(&item) {
                    Some(acc) => *acc += BigRational::one(),
                    None => {
                        exponents.insert(item.clone(), BigRational::one());
                        bases.push(item);
                    }
                },
            }
        }

        let mut result: Vec<Tensor> = Vec::with_capacity(bases.len());
        for base in bases {
            let exponent = exponents
                .remove(&base)
                .expect("base recorded without exponent");
            let rebuilt = Tensor::power(base, Tensor::number(exponent));
            match rebuilt.node() {
                Node::Number(n) => factor *= n,
                _ => result.push(rebuilt),
            }
        }

        if factor.is_zero() {
            return Tensor::zero();
        }
        result.sort_by(canonical_cmp);

        match result.len() {
            0 => Tensor::number(factor),
            1 if factor.is_one() => result.pop().expect("one factor"),
            _ => Tensor::raw(Node::Product(Product {
                factor,
                content: result,
            })),
        }
    }

    /// Builds a power, folding the trivial exponents and literal numeric
    /// bases with integer exponents.
    pub fn power(base: Tensor, exponent: Tensor) -> Tensor {
        if exponent.is_zero() {
            return Tensor::one();
        }
        if exponent.is_one() {
            return base;
        }
        if base.is_one() {
            return Tensor::one();
        }
        if let (Some(b), Some(e)) = (base.as_number(), exponent.as_number()) {
            if e.is_integer() {
                if let Some(n) = num::ToPrimitive::to_i64(&e.to_integer()) {
                    if let Some(folded) = pow_rational(b, n) {
                        return Tensor::number(folded);
                    }
                }
            }
        }
        Tensor::raw(Node::Power(Power { base, exponent }))
    }

    pub fn mul(a: Tensor, b: Tensor) -> Tensor {
        Tensor::product(BigRational::one(), vec![a, b])
    }

    pub fn add(a: Tensor, b: Tensor) -> Tensor {
        Tensor::sum(vec![a, b])
    }

    pub fn sub(a: Tensor, b: Tensor) -> Tensor {
        Tensor::sum(vec![a, b.neg()])
    }

    pub fn neg(&self) -> Tensor {
        Tensor::product(-BigRational::one(), vec![self.clone()])
    }

    /// The multiplicative inverse, as a `-1` power.
    pub fn inverse(&self) -> Tensor {
        if let Some(n) = self.as_number() {
            if !n.is_zero() {
                return Tensor::number(n.recip());
            }
        }
        Tensor::power(self.clone(), Tensor::integer(-1))
    }
}

fn pow_rational(base: &BigRational, exponent: i64) -> Option<BigRational> {
    if base.is_zero() && exponent <= 0 {
        return None;
    }
    let magnitude = num::pow::pow(base.clone(), exponent.unsigned_abs() as usize);
    if exponent < 0 {
        Some(magnitude.recip())
    } else {
        Some(magnitude)
    }
}

impl std::ops::Add for Tensor {
    type Output = Tensor;

    fn add(self, rhs: Tensor) -> Tensor {
        Tensor::add(self, rhs)
    }
}

impl std::ops::Sub for Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Tensor) -> Tensor {
        Tensor::sub(self, rhs)
    }
}

impl std::ops::Mul for Tensor {
    type Output = Tensor;

    fn mul(self, rhs: Tensor) -> Tensor {
        Tensor::mul(self, rhs)
    }
}

impl std::ops::Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        Tensor::neg(&self)
    }
}

impl From<BigRational> for Tensor {
    fn from(n: BigRational) -> Tensor {
        Tensor::number(n)
    }
}

impl From<i64> for Tensor {
    fn from(n: i64) -> Tensor {
        Tensor::integer(n)
    }
}

/// True when the factor should render with a leading minus.
pub(crate) fn negative_head(t: &Tensor) -> bool {
    match t.node() {
        Node::Number(n) => n.is_negative(),
        Node::Product(p) => p.factor.is_negative(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(id: u32) -> Tensor {
        Tensor::simple(NameId(id), vec![])
    }

    #[test]
    fn sum_flattens_and_folds() {
        let a = sym(0);
        let t = Tensor::sum(vec![
            a.clone(),
            Tensor::integer(2),
            Tensor::sum(vec![a.clone(), Tensor::integer(3)]),
        ]);
        // 2a + 5
        let s = t.as_sum().expect("sum");
        assert_eq!(s.addends.len(), 2);
        assert!(s
            .addends
            .iter()
            .any(|x| x.as_number().map(|n| n == &BigRational::from(BigInt::from(5))) == Some(true)));
    }

    #[test]
    fn sum_merges_scalar_multiples() {
        let a = sym(0);
        let twice = Tensor::sum(vec![a.clone(), a.clone()]);
        let p = twice.as_product().expect("2*a");
        assert_eq!(p.factor, BigRational::from(BigInt::from(2)));
        assert_eq!(p.content.len(), 1);
    }

    #[test]
    fn sum_cancels_to_zero() {
        let a = sym(0);
        let t = Tensor::sum(vec![a.clone(), a.neg()]);
        assert!(t.is_zero());
    }

    #[test]
    fn product_flattens_and_collapses() {
        let a = sym(0);
        let b = sym(1);
        let t = Tensor::product(
            BigRational::from(BigInt::from(2)),
            vec![a.clone(), Tensor::mul(b.clone(), Tensor::integer(3))],
        );
        let p = t.as_product().expect("product");
        assert_eq!(p.factor, BigRational::from(BigInt::from(6)));
        assert_eq!(p.content.len(), 2);

        assert!(Tensor::product(BigRational::zero(), vec![a.clone()]).is_zero());
        assert_eq!(Tensor::product(BigRational::one(), vec![a.clone()]), a);
    }

    #[test]
    fn product_groups_repeated_factors() {
        let a = sym(0);
        let squared = Tensor::mul(a.clone(), a.clone());
        let p = squared.as_power().expect("a^2");
        assert_eq!(p.base, a);
        assert_eq!(p.exponent, Tensor::integer(2));

        let cubed = Tensor::mul(a.clone(), squared);
        assert_eq!(cubed.integer_exponent(), Some(3));

        let cancelled = Tensor::mul(a.clone(), a.inverse());
        assert!(cancelled.is_one());
    }

    #[test]
    fn product_is_order_insensitive() {
        let a = sym(0);
        let b = sym(1);
        assert_eq!(
            Tensor::mul(a.clone(), b.clone()),
            Tensor::mul(b.clone(), a.clone())
        );
    }

    #[test]
    fn power_folds_trivial_cases() {
        let a = sym(0);
        assert!(Tensor::power(a.clone(), Tensor::integer(0)).is_one());
        assert_eq!(Tensor::power(a.clone(), Tensor::integer(1)), a);
        assert_eq!(
            Tensor::power(Tensor::integer(2), Tensor::integer(-2)),
            Tensor::rational(1, 4)
        );
    }

    #[test]
    fn unchanged_reference_survives_with_children() {
        let a = sym(0);
        let b = sym(1);
        let t = Tensor::mul(a.clone(), b.clone());
        let p = t.as_product().expect("product");
        let rebuilt = t.with_children(p.content.clone());
        assert_eq!(rebuilt, t);
    }
}
