//! Arithmetic evaluator behind the `calculate` tool.
//!
//! Supports `+ - * / // ** ( )`, unary signs, and integer/decimal literals.
//! Integers stay integral (promoting to float on overflow); `/` always
//! yields a float.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Integral JSON numbers stay `Int`; anything else numeric becomes `Float`
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        value
            .as_i64()
            .map(Number::Int)
            .or_else(|| value.as_f64().map(Number::Float))
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("invalid expression: {0}")]
    Syntax(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    DoubleStar,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_literal(&literal)?));
            }
            other => {
                return Err(CalcError::Syntax(format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

fn parse_literal(literal: &str) -> Result<Number, CalcError> {
    if literal == "." || literal.matches('.').count() > 1 {
        return Err(CalcError::Syntax(format!("bad number '{}'", literal)));
    }
    if literal.contains('.') {
        return literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| CalcError::Syntax(format!("bad number '{}'", literal)));
    }
    match literal.parse::<i64>() {
        Ok(i) => Ok(Number::Int(i)),
        Err(_) => literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| CalcError::Syntax(format!("bad number '{}'", literal))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Number, CalcError> {
        let mut value = self.term()?;
        while let Some(token @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if token == Token::Plus {
                add(value, rhs)
            } else {
                sub(value, rhs)
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Number, CalcError> {
        let mut value = self.factor()?;
        while let Some(token @ (Token::Star | Token::Slash | Token::DoubleSlash)) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = match token {
                Token::Star => mul(value, rhs),
                Token::Slash => div(value, rhs)?,
                _ => floor_div(value, rhs)?,
            };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<Number, CalcError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.factor()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(negate(self.factor()?))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Number, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::DoubleStar) {
            self.pos += 1;
            let exponent = self.factor()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(CalcError::Syntax("missing ')'".to_string())),
                }
            }
            Some(other) => Err(CalcError::Syntax(format!("unexpected token {:?}", other))),
            None => Err(CalcError::Syntax("unexpected end of expression".to_string())),
        }
    }
}

pub(crate) fn add(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x
            .checked_add(y)
            .map(Number::Int)
            .unwrap_or(Number::Float(x as f64 + y as f64)),
        _ => Number::Float(a.as_f64() + b.as_f64()),
    }
}

fn sub(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x
            .checked_sub(y)
            .map(Number::Int)
            .unwrap_or(Number::Float(x as f64 - y as f64)),
        _ => Number::Float(a.as_f64() - b.as_f64()),
    }
}

pub(crate) fn mul(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x
            .checked_mul(y)
            .map(Number::Int)
            .unwrap_or(Number::Float(x as f64 * y as f64)),
        _ => Number::Float(a.as_f64() * b.as_f64()),
    }
}

fn div(a: Number, b: Number) -> Result<Number, CalcError> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

fn floor_div(a: Number, b: Number) -> Result<Number, CalcError> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => match x.checked_div(y) {
            Some(q) if x % y != 0 && ((x < 0) != (y < 0)) => Ok(Number::Int(q - 1)),
            Some(q) => Ok(Number::Int(q)),
            None => Ok(Number::Float((x as f64 / y as f64).floor())),
        },
        _ => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, CalcError> {
    if let (Number::Int(b), Number::Int(e)) = (base, exponent) {
        if e >= 0 {
            if let Some(value) = u32::try_from(e).ok().and_then(|e| b.checked_pow(e)) {
                return Ok(Number::Int(value));
            }
        } else if b == 0 {
            return Err(CalcError::DivisionByZero);
        }
    }
    finite(base.as_f64().powf(exponent.as_f64()))
}

fn finite(value: f64) -> Result<Number, CalcError> {
    if value.is_finite() {
        Ok(Number::Float(value))
    } else {
        Err(CalcError::NotFinite)
    }
}

fn negate(n: Number) -> Number {
    match n {
        Number::Int(i) => i.checked_neg().map(Number::Int).unwrap_or(Number::Float(-(i as f64))),
        Number::Float(f) => Number::Float(-f),
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(input: &str) -> Result<Number, CalcError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CalcError::Syntax("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(CalcError::Syntax(format!(
            "unexpected token {:?}",
            parser.tokens[parser.pos]
        )));
    }
    match value {
        Number::Float(f) => finite(f),
        int => Ok(int),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str) -> String {
        evaluate(input).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4"), "14");
        assert_eq!(eval("(2 + 3) * 4"), "20");
        assert_eq!(eval("10 - 4 - 3"), "3");
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(eval("7 / 2"), "3.5");
        assert_eq!(eval("4 / 2"), "2.0");
        assert_eq!(eval("7 // 2"), "3");
        assert_eq!(eval("-7 // 2"), "-4");
    }

    #[test]
    fn test_power_and_unary() {
        assert_eq!(eval("2 ** 10"), "1024");
        assert_eq!(eval("2 ** 3 ** 2"), "512");
        assert_eq!(eval("-2 ** 2"), "-4");
        assert_eq!(eval("2 ** -1"), "0.5");
        assert_eq!(eval("-(3 - 5)"), "2");
    }

    #[test]
    fn test_decimals() {
        assert_eq!(eval("1.5 + 1.5"), "3.0");
        assert_eq!(eval(".5 * 4"), "2.0");
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("1 // 0"), Err(CalcError::DivisionByZero));
        assert!(matches!(evaluate("2 +"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("(1 + 2"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("1 2"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("1..2"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("   "), Err(CalcError::Syntax(_))));
    }

    #[test]
    fn test_non_finite_results_rejected() {
        assert_eq!(evaluate("(0-8) ** 0.5"), Err(CalcError::NotFinite));
        assert_eq!(evaluate("9 ** 9 ** 9"), Err(CalcError::NotFinite));
        assert_eq!(evaluate("10.0 ** 300 * 10.0 ** 300"), Err(CalcError::NotFinite));
        assert_eq!(eval("(0-8) ** 2"), "64");
    }
}
