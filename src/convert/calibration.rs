//! Calibrated analog (ADC) values.
//!
//! A raw ADC word is masked down to its resolution and substituted for the
//! variable `adc` in a per-field calibration formula. Formulas use a small
//! arithmetic grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary (('^' | '**') unary)?
//! primary := number | 'adc' | '(' expr ')'
//! ```
//!
//! Exponentiation is right associative and binds tighter than a leading
//! minus, so `-adc^2` is `-(adc^2)`. Typographic minus signs (`–`, `—`, `−`)
//! are read as `-`.
//!
//! ```rust
//! use spacepacket::convert::calibration::CalibrationFormula;
//!
//! # fn main() -> spacepacket::Result<()> {
//! let formula = CalibrationFormula::parse("(adc * 3.3 / 4095) ^ 2 – 0.5")?;
//! let volts = formula.evaluate(4095.0)?;
//! assert!((volts - 10.39).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```

use crate::{DecodeError, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Resolution of an ADC reading inside its 16-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdcResolution {
    Bits10,
    Bits12,
}

impl AdcResolution {
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim() {
            "12-bit ADC" => Ok(AdcResolution::Bits12),
            "10-bit ADC" => Ok(AdcResolution::Bits10),
            other => Err(DecodeError::unsupported_format(other, "", "unknown ADC resolution")),
        }
    }

    pub const fn mask_bits(self) -> u64 {
        match self {
            AdcResolution::Bits10 => 0x03FF,
            AdcResolution::Bits12 => 0x0FFF,
        }
    }

    /// Keep only the low resolution bits of the raw word.
    pub const fn mask(self, raw: u64) -> u64 {
        raw & self.mask_bits()
    }
}

/// Parsed calibration expression over the single variable `adc`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationFormula {
    source: String,
    expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Adc,
    Neg(Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Adc,
    Op(Op),
    LParen,
    RParen,
}

impl CalibrationFormula {
    /// Parse a formula, rejecting anything outside the grammar.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens: &tokens, pos: 0, source };
        let expr = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(DecodeError::calibration(
                source,
                format!("unexpected {:?} after end of expression", tokens[parser.pos]),
            ));
        }
        Ok(Self { source: source.to_string(), expr })
    }

    /// Evaluate with `adc` bound to the masked reading.
    pub fn evaluate(&self, adc: f64) -> Result<f64> {
        let value = eval(&self.expr, adc, &self.source)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DecodeError::calibration(&self.source, "result is not a finite number"))
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn eval(expr: &Expr, adc: f64, source: &str) -> Result<f64> {
    Ok(match expr {
        Expr::Number(n) => *n,
        Expr::Adc => adc,
        Expr::Neg(inner) => -eval(inner, adc, source)?,
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, adc, source)?;
            let rhs = eval(rhs, adc, source)?;
            match op {
                Op::Add => lhs + rhs,
                Op::Sub => lhs - rhs,
                Op::Mul => lhs * rhs,
                Op::Div if rhs == 0.0 => {
                    return Err(DecodeError::calibration(source, "division by zero"));
                }
                Op::Div => lhs / rhs,
                Op::Pow => lhs.powf(rhs),
            }
        }
    })
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => tokens.push(Token::Number(number(&mut chars, source)?)),
            '+' => {
                chars.next();
                tokens.push(Token::Op(Op::Add));
            }
            '-' | '–' | '—' | '−' => {
                chars.next();
                tokens.push(Token::Op(Op::Sub));
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Op(Op::Pow));
                } else {
                    tokens.push(Token::Op(Op::Mul));
                }
            }
            '/' => {
                chars.next();
                tokens.push(Token::Op(Op::Div));
            }
            '^' => {
                chars.next();
                tokens.push(Token::Op(Op::Pow));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !c.is_ascii_alphanumeric() && c != '_' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                if !word.eq_ignore_ascii_case("adc") {
                    return Err(DecodeError::calibration(
                        source,
                        format!("unknown identifier '{}'", word),
                    ));
                }
                tokens.push(Token::Adc);
            }
            other => {
                return Err(DecodeError::calibration(
                    source,
                    format!("unexpected character {:?}", other),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Decimal literal with an optional exponent (`1.5e-3`).
fn number(chars: &mut Peekable<Chars<'_>>, source: &str) -> Result<f64> {
    let mut literal = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            literal.push(c);
            chars.next();
        } else if (c == 'e' || c == 'E') && !literal.is_empty() {
            let mut lookahead = chars.clone();
            lookahead.next();
            let signed = matches!(lookahead.peek(), Some('+') | Some('-'));
            if signed {
                lookahead.next();
            }
            if !matches!(lookahead.peek(), Some(d) if d.is_ascii_digit()) {
                break;
            }
            literal.push('e');
            chars.next();
            if signed {
                if let Some(sign) = chars.next() {
                    literal.push(sign);
                }
            }
        } else {
            break;
        }
    }

    literal
        .parse::<f64>()
        .map_err(|_| DecodeError::calibration(source, format!("invalid number '{}'", literal)))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn error(&self, details: impl Into<String>) -> DecodeError {
        DecodeError::calibration(self.source, details)
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ (Op::Add | Op::Sub))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ (Op::Mul | Op::Div))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Op(Op::Sub)) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if let Some(Token::Op(Op::Pow)) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary(Op::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Adc) => Ok(Expr::Adc),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            Some(other) => Err(self.error(format!("unexpected {:?}", other))),
            None => Err(self.error("unexpected end of formula")),
        }
    }
}
