//! Recursive-descent parser for the surface syntax.
//!
//! The grammar is the conventional abstract-index notation:
//! `A_{mn}*B^{n} + 2*Sin[x]`, greek indices as `\mu`, fields as
//! `f_{m}[x_{a}]`, rules as `lhs = rhs`. Index letters are lowercase (latin)
//! or backslash-escaped greek words, optionally suffixed with digits
//! (`a1`); symbol names start with a letter and may continue with letters
//! and digits.

use ahash::AHashMap;
use num::{BigInt, BigRational};
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::context::Context;
use crate::structure::{Index, IndexKind, IndexName, Polarity};
use crate::tree::{FunctionKind, Tensor};
use crate::utils::{greek_id, latin_id};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character {ch:?} at offset {at}")]
    UnexpectedChar { ch: char, at: usize },
    #[error("unknown greek index name \\{0}")]
    UnknownGreek(String),
    #[error("trailing input at offset {0}")]
    TrailingInput(usize),
    #[error("a rule needs exactly one top-level `=`")]
    MalformedRule,
    #[error("empty input")]
    Empty,
}

static FUNCTIONS: Lazy<AHashMap<&'static str, FunctionKind>> = Lazy::new(|| {
    let mut table = AHashMap::new();
    table.insert("Sin", FunctionKind::Sin);
    table.insert("Cos", FunctionKind::Cos);
    table.insert("Tan", FunctionKind::Tan);
    table.insert("Exp", FunctionKind::Exp);
    table.insert("Log", FunctionKind::Log);
    table.insert("Sqrt", FunctionKind::Sqrt);
    table
});

pub fn parse(ctx: &Context, text: &str) -> Result<Tensor, ParseError> {
    let mut parser = Parser::new(ctx, text);
    parser.skip_ws();
    if parser.at_end() {
        return Err(ParseError::Empty);
    }
    let expr = parser.expr()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(ParseError::TrailingInput(parser.pos));
    }
    Ok(expr)
}

pub fn parse_rule(ctx: &Context, text: &str) -> Result<(Tensor, Tensor), ParseError> {
    let mut depth = 0usize;
    let mut split = None;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => {
                if split.is_some() {
                    return Err(ParseError::MalformedRule);
                }
                split = Some(i);
            }
            _ => {}
        }
    }
    let at = split.ok_or(ParseError::MalformedRule)?;
    let from = parse(ctx, &text[..at])?;
    let to = parse(ctx, &text[at + 1..])?;
    Ok((from, to))
}

struct Parser<'a> {
    ctx: &'a Context,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(ctx: &'a Context, text: &str) -> Self {
        Parser {
            ctx,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(ch) if ch == wanted => Ok(()),
            Some(ch) => Err(ParseError::UnexpectedChar {
                ch,
                at: self.pos - 1,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Tensor, ParseError> {
        let mut addends = vec![self.term()?];
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.bump();
                    addends.push(self.term()?);
                }
                Some('-') => {
                    self.bump();
                    addends.push(self.term()?.neg());
                }
                _ => break,
            }
        }
        if addends.len() == 1 {
            Ok(addends.pop().expect("one addend"))
        } else {
            Ok(Tensor::sum(addends))
        }
    }

    fn term(&mut self) -> Result<Tensor, ParseError> {
        let mut factors = vec![self.factor()?];
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.bump();
                    factors.push(self.factor()?);
                }
                Some('/') => {
                    self.bump();
                    let divisor = self.factor()?;
                    factors.push(divisor.inverse());
                }
                _ => break,
            }
        }
        if factors.len() == 1 {
            Ok(factors.pop().expect("one factor"))
        } else {
            Ok(Tensor::product(num::One::one(), factors))
        }
    }

    fn factor(&mut self) -> Result<Tensor, ParseError> {
        self.skip_ws();
        let mut negate = false;
        while let Some(sign) = self.peek() {
            match sign {
                '-' => {
                    negate = !negate;
                    self.bump();
                    self.skip_ws();
                }
                '+' => {
                    self.bump();
                    self.skip_ws();
                }
                _ => break,
            }
        }
        let mut base = self.atom()?;
        self.skip_ws();
        if self.peek() == Some('^') {
            self.bump();
            self.skip_ws();
            let exponent = if self.peek() == Some('-') {
                self.bump();
                self.atom()?.neg()
            } else {
                self.atom()?
            };
            base = Tensor::power(base, exponent);
        }
        Ok(if negate { base.neg() } else { base })
    }

    fn atom(&mut self) -> Result<Tensor, ParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ParseError::UnexpectedEnd),
            Some('(') => {
                self.bump();
                let inner = self.expr()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.symbol(),
            Some(ch) => Err(ParseError::UnexpectedChar { ch, at: self.pos }),
        }
    }

    fn number(&mut self) -> Result<Tensor, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let value: BigInt = digits.parse().expect("digit run parses");
        Ok(Tensor::number(BigRational::from(value)))
    }

    fn symbol(&mut self) -> Result<Tensor, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
            self.bump();
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if let Some(&kind) = FUNCTIONS.get(word.as_str()) {
            self.skip_ws();
            self.expect('[')?;
            let arg = self.expr()?;
            self.skip_ws();
            self.expect(']')?;
            return Ok(Tensor::function(kind, arg));
        }

        let indices = self.signature()?;
        self.skip_ws();
        if self.peek() == Some('[') {
            self.bump();
            let mut args = vec![self.expr()?];
            loop {
                self.skip_ws();
                match self.peek() {
                    Some(',') => {
                        self.bump();
                        args.push(self.expr()?);
                    }
                    Some(']') => {
                        self.bump();
                        break;
                    }
                    Some(ch) => {
                        return Err(ParseError::UnexpectedChar { ch, at: self.pos })
                    }
                    None => return Err(ParseError::UnexpectedEnd),
                }
            }
            return Ok(Tensor::field(self.ctx.intern(&word), indices, args));
        }

        Ok(Tensor::simple(self.ctx.intern(&word), indices))
    }

    fn signature(&mut self) -> Result<Vec<Index>, ParseError> {
        let mut indices = Vec::new();
        loop {
            let polarity = match self.peek() {
                Some('_') => Polarity::Lower,
                Some('^') if self.is_index_group_ahead() => Polarity::Upper,
                _ => break,
            };
            self.bump();
            if self.peek() == Some('{') {
                self.bump();
                loop {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.bump();
                        break;
                    }
                    indices.push(self.index(polarity)?);
                }
            } else {
                indices.push(self.index(polarity)?);
            }
        }
        Ok(indices)
    }

    /// Disambiguates `A^{a}` (signature) from `a^2` (power): an upper index
    /// group starts with `{`, a lowercase letter, or a greek escape.
    fn is_index_group_ahead(&self) -> bool {
        match self.chars.get(self.pos + 1) {
            Some('{') | Some('\\') => true,
            Some(c) => c.is_ascii_lowercase(),
            None => false,
        }
    }

    fn index(&mut self, polarity: Polarity) -> Result<Index, ParseError> {
        self.skip_ws();
        let name = match self.bump() {
            Some('\\') => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_lowercase()) {
                    self.bump();
                }
                let word: String = self.chars[start..self.pos].iter().collect();
                let id = greek_id(&word).ok_or(ParseError::UnknownGreek(word))?;
                IndexName::new(IndexKind::Greek, id + 24 * self.index_round()?)
            }
            Some(c) if c.is_ascii_lowercase() => {
                let id = latin_id(c).expect("lowercase ascii letter");
                IndexName::new(IndexKind::Latin, id + 26 * self.index_round()?)
            }
            Some(ch) => {
                return Err(ParseError::UnexpectedChar {
                    ch,
                    at: self.pos - 1,
                })
            }
            None => return Err(ParseError::UnexpectedEnd),
        };
        Ok(Index { name, polarity })
    }

    /// The optional numeric suffix of an index letter (`a1` is round 1).
    fn index_round(&mut self) -> Result<u32, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if start == self.pos {
            return Ok(0);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        Ok(digits.parse().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    #[test]
    fn parses_indexed_product() {
        let ctx = Context::new();
        let t = ctx.parse("A_{mn}*B^{n}").unwrap();
        let p = t.as_product().expect("product");
        assert_eq!(p.content.len(), 2);
        let free = t.free_indices();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].polarity, Polarity::Lower);
    }

    #[test]
    fn upper_signature_vs_power() {
        let ctx = Context::new();
        let sig = ctx.parse("B^{n}").unwrap();
        assert!(sig.as_simple().is_some());
        let pow = ctx.parse("b^2").unwrap();
        assert!(pow.as_power().is_some());
    }

    #[test]
    fn greek_and_suffixed_indices() {
        let ctx = Context::new();
        let t = ctx.parse("T_{\\mu}^{\\nu}").unwrap();
        let s = t.as_simple().expect("simple");
        assert_eq!(s.indices.len(), 2);
        assert_eq!(s.indices[0].name.kind, IndexKind::Greek);

        let t = ctx.parse("A_{a1b}").unwrap();
        let s = t.as_simple().expect("simple");
        assert_eq!(s.indices[0].name.id, 26);
        assert_eq!(s.indices[1].name.id, 1);
    }

    #[test]
    fn division_and_negation() {
        let ctx = Context::new();
        assert_eq!(ctx.parse("1/2").unwrap(), Tensor::rational(1, 2));
        assert_eq!(ctx.parse("-3").unwrap(), Tensor::integer(-3));
        let t = ctx.parse("a/(x + y)").unwrap();
        assert!(matches!(t.node(), Node::Product(_)));
    }

    #[test]
    fn functions_and_fields() {
        let ctx = Context::new();
        let f = ctx.parse("Sin[x + y]").unwrap();
        assert!(matches!(f.node(), Node::Function(_)));
        let field = ctx.parse("f_{m}[x_{a}, y]").unwrap();
        let field = field.as_field().expect("field");
        assert_eq!(field.args.len(), 2);
        assert_eq!(field.indices.len(), 1);
    }

    #[test]
    fn rules_split_on_top_level_equals() {
        let ctx = Context::new();
        let (from, to) = ctx.parse_rule("A_{mn} = B_{m}*C_{n}").unwrap();
        assert!(from.as_simple().is_some());
        assert!(to.as_product().is_some());
        assert!(ctx.parse_rule("a + b").is_err());
    }

    #[test]
    fn rejects_garbage() {
        let ctx = Context::new();
        assert_eq!(ctx.parse(""), Err(ParseError::Empty));
        assert!(matches!(
            ctx.parse("a + "),
            Err(ParseError::UnexpectedEnd)
        ));
        assert!(matches!(
            ctx.parse("a b"),
            Err(ParseError::TrailingInput(_))
        ));
    }
}
