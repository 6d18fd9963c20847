//! Calculator Provider
//!
//! Evaluates arithmetic expressions without touching any external service.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom (('**' | '^') unary)?
//! atom   := number | '(' expr ')'
//! ```
//!
//! Exponentiation is right-associative and binds tighter than a leading
//! minus, so `-2 ** 2` is `-4`. Integer arithmetic stays integral until a
//! division or an overflow forces a float.

use async_trait::async_trait;
use serde_json::{Number as JsonNumber, Value, json};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, ToolProvider, ToolSpec};

use crate::error::{Result, ToolKitError};

/// Provider exposing `calculate`
pub struct CalculatorProvider;

#[async_trait]
impl ToolProvider for CalculatorProvider {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Safe math calculator"
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("calculate", "Evaluate a mathematical expression").param(
                ParameterSchema::required(
                    "expression",
                    "string",
                    "Arithmetic expression, e.g. '(2 + 3) * 4 ** 2'",
                ),
            ),
        ]
    }

    async fn execute(&self, tool: &str, arguments: &Arguments) -> CoreResult<Value> {
        if tool != "calculate" {
            return Err(ToolKitError::UnknownTool(tool.to_string()).into());
        }

        let expression = match arguments.get("expression") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ToolKitError::Syntax("expression must be a string".into()).into()),
        };

        let result = evaluate(&expression)?;
        tracing::debug!(%expression, ?result, "Evaluated expression");

        Ok(json!({
            "result": result.to_json()?,
            "expression": expression,
        }))
    }
}

/// Numeric value produced by the evaluator
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(i) => i == 0,
            Self::Float(f) => f == 0.0,
        }
    }

    fn to_json(self) -> Result<Value> {
        match self {
            Self::Int(i) => Ok(Value::from(i)),
            Self::Float(f) => JsonNumber::from_f64(f)
                .map(Value::Number)
                .ok_or(ToolKitError::NotFinite),
        }
    }

    fn add(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_add(b)
                .map_or_else(|| Self::Float(self.as_f64() + rhs.as_f64()), Self::Int),
            _ => Self::Float(self.as_f64() + rhs.as_f64()),
        }
    }

    fn sub(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_sub(b)
                .map_or_else(|| Self::Float(self.as_f64() - rhs.as_f64()), Self::Int),
            _ => Self::Float(self.as_f64() - rhs.as_f64()),
        }
    }

    fn mul(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_mul(b)
                .map_or_else(|| Self::Float(self.as_f64() * rhs.as_f64()), Self::Int),
            _ => Self::Float(self.as_f64() * rhs.as_f64()),
        }
    }

    fn div(self, rhs: Self) -> Result<Self> {
        if rhs.is_zero() {
            return Err(ToolKitError::DivisionByZero);
        }
        Ok(Self::Float(self.as_f64() / rhs.as_f64()))
    }

    /// Remainder takes the sign of the divisor
    fn rem(self, rhs: Self) -> Result<Self> {
        if rhs.is_zero() {
            return Err(ToolKitError::DivisionByZero);
        }
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => {
                let r = a.checked_rem(b).unwrap_or(0);
                Ok(Self::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            _ => {
                let (a, b) = (self.as_f64(), rhs.as_f64());
                let r = a % b;
                Ok(Self::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
            }
        }
    }

    fn pow(self, rhs: Self) -> Result<Self> {
        if let (Self::Int(base), Self::Int(exp)) = (self, rhs) {
            if let Ok(exp) = u32::try_from(exp) {
                if let Some(v) = base.checked_pow(exp) {
                    return Ok(Self::Int(v));
                }
            } else if base == 0 {
                return Err(ToolKitError::DivisionByZero);
            }
        }
        Ok(Self::Float(self.as_f64().powf(rhs.as_f64())))
    }

    fn neg(self) -> Self {
        match self {
            Self::Int(i) => i.checked_neg().map_or(Self::Float(-self.as_f64()), Self::Int),
            Self::Float(f) => Self::Float(-f),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&literal)?));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            _ => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Pow,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    other => {
                        return Err(ToolKitError::Syntax(format!(
                            "unexpected character '{other}' at position {i}"
                        )));
                    }
                });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> Result<Number> {
    let is_float = literal.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(i) = literal.parse::<i64>() {
            return Ok(Number::Int(i));
        }
    }
    literal
        .parse::<f64>()
        .map(Number::Float)
        .map_err(|_| ToolKitError::Syntax(format!("invalid number '{literal}'")))
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 100;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
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

    fn expr(&mut self) -> Result<Number> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value.add(rhs) } else { value.sub(rhs) };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<Number> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::Percent)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value.mul(rhs),
                Token::Slash => value.div(rhs)?,
                _ => value.rem(rhs)?,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Number> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolKitError::Syntax("expression nested too deeply".into()));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<Number> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(self.unary()?.neg())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Number> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return base.pow(exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ToolKitError::Syntax("missing closing parenthesis".into())),
                }
            }
            Some(other) => Err(ToolKitError::Syntax(format!("unexpected token {other:?}"))),
            None => Err(ToolKitError::Syntax("unexpected end of expression".into())),
        }
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<Number> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ToolKitError::Syntax("empty expression".into()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ToolKitError::Syntax(format!("unexpected token {extra:?}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(expression: &str) -> Arguments {
        let mut map = Arguments::new();
        map.insert("expression".into(), json!(expression));
        map
    }

    #[test]
    fn test_precedence_and_grouping() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), Number::Int(14));
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), Number::Int(20));
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), Number::Int(512));
        assert_eq!(evaluate("2 ^ 10").unwrap(), Number::Int(1024));
        assert_eq!(evaluate("-2 ** 2").unwrap(), Number::Int(-4));
        assert_eq!(evaluate("--3").unwrap(), Number::Int(3));
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(evaluate("7 / 2").unwrap(), Number::Float(3.5));
        assert_eq!(evaluate("4 / 2").unwrap(), Number::Float(2.0));
        assert_eq!(evaluate("2 ** -1").unwrap(), Number::Float(0.5));
        assert_eq!(evaluate("1.5e2").unwrap(), Number::Float(150.0));
    }

    #[test]
    fn test_remainder_follows_divisor_sign() {
        assert_eq!(evaluate("7 % 3").unwrap(), Number::Int(1));
        assert_eq!(evaluate("-7 % 3").unwrap(), Number::Int(2));
        assert_eq!(evaluate("7 % -3").unwrap(), Number::Int(-2));
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        assert!(matches!(evaluate("9223372036854775807 + 1").unwrap(), Number::Float(_)));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(evaluate("1 / 0"), Err(ToolKitError::DivisionByZero)));
        assert!(matches!(evaluate("5 % 0"), Err(ToolKitError::DivisionByZero)));
        assert!(matches!(evaluate("(1 + 2"), Err(ToolKitError::Syntax(_))));
        assert!(matches!(evaluate("1 +"), Err(ToolKitError::Syntax(_))));
        assert!(matches!(evaluate("1 2"), Err(ToolKitError::Syntax(_))));
        assert!(matches!(evaluate("import os"), Err(ToolKitError::Syntax(_))));
        assert!(matches!(evaluate("   "), Err(ToolKitError::Syntax(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(evaluate(&deep), Err(ToolKitError::Syntax(msg)) if msg.contains("too deeply")));

        let signs = format!("{}1", "-".repeat(10_000));
        assert!(matches!(evaluate(&signs), Err(ToolKitError::Syntax(_))));

        let shallow = format!("{}7{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(evaluate(&shallow).unwrap(), Number::Int(7));
    }

    #[tokio::test]
    async fn test_calculate_tool() {
        let result = CalculatorProvider
            .execute("calculate", &args("2+2"))
            .await
            .unwrap();
        assert_eq!(result, json!({"result": 4, "expression": "2+2"}));

        let result = CalculatorProvider
            .execute("calculate", &args("1/4"))
            .await
            .unwrap();
        assert_eq!(result["result"], json!(0.25));
    }

    #[tokio::test]
    async fn test_calculate_failures() {
        let err = CalculatorProvider
            .execute("calculate", &args("10 / 0"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tool execution error: Division by zero");

        let err = CalculatorProvider
            .execute("differentiate", &args("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool: differentiate"));
    }
}
