//! Arithmetic expression evaluator
//!
//! A recursive-descent parser over a closed grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | 'e' | func '(' expr ')' | '(' expr ')'
//! func    := 'sqrt' | 'sin' | 'cos' | 'tan' | 'log'
//! ```
//!
//! Input containing any character outside that grammar's alphabet is refused
//! before lexing starts. Integer literals stay integers through `+ - *` the
//! way a pocket calculator would show them; `/`, functions and `e` give floats.

use std::fmt;

/// Characters that may appear anywhere in an expression
const ALPHABET: &str = "0123456789.+-*/() \tsqrtincoaleg";

const FUNCTIONS: &[&str] = &["sqrt", "sin", "cos", "tan", "log"];

/// Longest accepted expression, in characters
pub const MAX_EXPRESSION_CHARS: usize = 1_000;

/// Deepest accepted nesting of parentheses, calls and unary signs
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError(String);

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ExprError {}

fn err<T>(msg: impl Into<String>) -> Result<T, ExprError> {
    Err(ExprError(msg.into()))
}

/// A computed value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Number::Int(_) => "int",
            Number::Float(_) => "float",
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        match self {
            Number::Int(i) => serde_json::json!(i),
            Number::Float(f) => serde_json::json!(f),
        }
    }

    fn int_op(self, rhs: Number, op: fn(i64, i64) -> Option<i64>, fop: fn(f64, f64) -> f64) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match op(a, b) {
                Some(v) => Number::Int(v),
                None => Number::Float(fop(a as f64, b as f64)),
            },
            (a, b) => Number::Float(fop(a.as_f64(), b.as_f64())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Evaluate an expression
pub fn evaluate(input: &str) -> Result<Number, ExprError> {
    if input.chars().count() > MAX_EXPRESSION_CHARS {
        return err(format!("expression longer than {} characters", MAX_EXPRESSION_CHARS));
    }

    if let Some(bad) = input.chars().find(|c| !ALPHABET.contains(c.to_ascii_lowercase())) {
        return err(format!("expression contains disallowed character '{}'", bad));
    }

    let tokens = lex(input)?;
    if tokens.is_empty() {
        return err("empty expression");
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return err("unexpected trailing input");
    }

    if let Number::Float(f) = value
        && !f.is_finite()
    {
        return err("result is not a finite number");
    }
    Ok(value)
}

fn lex(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if literal.contains('.') {
                    match literal.parse::<f64>() {
                        Ok(f) => tokens.push(Token::Float(f)),
                        Err(_) => return err(format!("invalid number '{}'", literal)),
                    }
                } else {
                    match literal.parse::<i64>() {
                        Ok(i) => tokens.push(Token::Int(i)),
                        // Too long for i64, still a valid number
                        Err(_) => match literal.parse::<f64>() {
                            Ok(f) => tokens.push(Token::Float(f)),
                            Err(_) => return err(format!("invalid number '{}'", literal)),
                        },
                    }
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphabetic() {
                        name.push(c.to_ascii_lowercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name != "e" && !FUNCTIONS.contains(&name.as_str()) {
                    return err(format!("unknown name '{}'", name));
                }
                tokens.push(Token::Ident(name));
            }
            '+' | '-' | '*' | '/' | '(' | ')' => {
                tokens.push(match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
                chars.next();
            }
            other => return err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    /// Run `f` one nesting level deeper, refusing past `MAX_DEPTH`
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ExprError>) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return err("expression nested too deeply");
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect_rparen(&mut self) -> Result<(), ExprError> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => err("expected ')'"),
        }
    }

    fn expr(&mut self) -> Result<Number, ExprError> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = left.int_op(right, i64::checked_add, |a, b| a + b);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = left.int_op(right, i64::checked_sub, |a, b| a - b);
                }
                _ => return Ok(left),
            }
        }
    }

    fn term(&mut self) -> Result<Number, ExprError> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = left.int_op(right, i64::checked_mul, |a, b| a * b);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    if right.as_f64() == 0.0 {
                        return err("division by zero");
                    }
                    left = Number::Float(left.as_f64() / right.as_f64());
                }
                _ => return Ok(left),
            }
        }
    }

    fn unary(&mut self) -> Result<Number, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(match self.nested(Self::unary)? {
                    Number::Int(i) => i.checked_neg().map(Number::Int).unwrap_or(Number::Float(-(i as f64))),
                    Number::Float(f) => Number::Float(-f),
                })
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Number, ExprError> {
        match self.next().cloned() {
            Some(Token::Int(i)) => Ok(Number::Int(i)),
            Some(Token::Float(f)) => Ok(Number::Float(f)),
            Some(Token::Ident(name)) if name == "e" => Ok(Number::Float(std::f64::consts::E)),
            Some(Token::Ident(name)) => {
                match self.next() {
                    Some(Token::LParen) => {}
                    _ => return err(format!("expected '(' after {}", name)),
                }
                let arg = self.nested(Self::expr)?.as_f64();
                self.expect_rparen()?;
                apply(&name, arg).map(Number::Float)
            }
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(_) => err("unexpected operator"),
            None => err("unexpected end of expression"),
        }
    }
}

fn apply(name: &str, arg: f64) -> Result<f64, ExprError> {
    match name {
        "sqrt" if arg < 0.0 => err("math domain error: sqrt of a negative number"),
        "sqrt" => Ok(arg.sqrt()),
        "sin" => Ok(arg.sin()),
        "cos" => Ok(arg.cos()),
        "tan" => Ok(arg.tan()),
        "log" if arg <= 0.0 => err("math domain error: log of a non-positive number"),
        "log" => Ok(arg.ln()),
        other => err(format!("unknown function '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_f(input: &str) -> f64 {
        evaluate(input).unwrap().as_f64()
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(evaluate("2+2").unwrap(), Number::Int(4));
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), Number::Int(14));
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), Number::Int(20));
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), Number::Int(3));
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(evaluate("7/2").unwrap(), Number::Float(3.5));
        assert_eq!(evaluate("4/2").unwrap().type_name(), "float");
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate("-3 + 5").unwrap(), Number::Int(2));
        assert_eq!(evaluate("-(2*3)").unwrap(), Number::Int(-6));
        assert_eq!(evaluate("--4").unwrap(), Number::Int(4));
    }

    #[test]
    fn test_functions_and_constant() {
        assert_eq!(eval_f("sqrt(16)"), 4.0);
        assert!((eval_f("sin(0)")).abs() < 1e-12);
        assert!((eval_f("cos(0)") - 1.0).abs() < 1e-12);
        assert!((eval_f("log(e)") - 1.0).abs() < 1e-12);
        assert!((eval_f("2*e") - 2.0 * std::f64::consts::E).abs() < 1e-12);
        assert_eq!(eval_f("SQRT(9)"), 3.0);
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(evaluate("1.5 * 2").unwrap(), Number::Float(3.0));
        assert!(evaluate("1.2.3").is_err());
    }

    #[test]
    fn test_integer_overflow_promotes() {
        let result = evaluate("9223372036854775807 + 1").unwrap();
        assert_eq!(result.type_name(), "float");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("1/0").unwrap_err().to_string(), "division by zero");
        assert!(evaluate("1/(2-2)").is_err());
    }

    #[test]
    fn test_domain_errors() {
        assert!(evaluate("sqrt(-1)").is_err());
        assert!(evaluate("log(0)").is_err());
    }

    #[test]
    fn test_rejects_disallowed_characters() {
        for input in ["__import__('os')", "2;3", "1 % 2", "2**3'", "x=1", "2^3", "[1]"] {
            let error = evaluate(input).unwrap_err();
            assert!(error.to_string().contains("disallowed character"), "{}: {}", input, error);
        }
    }

    #[test]
    fn test_rejects_unknown_names() {
        // Letters from the alphabet that don't spell a known function
        assert!(evaluate("cat(1)").unwrap_err().to_string().contains("unknown name"));
        assert!(evaluate("exit").is_err());
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(evaluate(&deep).unwrap_err().to_string(), "expression nested too deeply");

        let signs = format!("{}1", "-".repeat(500));
        assert_eq!(evaluate(&signs).unwrap_err().to_string(), "expression nested too deeply");

        let calls = format!("{}1{}", "sqrt(".repeat(100), ")".repeat(100));
        assert!(evaluate(&calls).is_err());

        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(evaluate(&shallow).unwrap(), Number::Int(1));
    }

    #[test]
    fn test_overlong_expression_rejected() {
        let long = "(".repeat(10_000);
        assert!(evaluate(&long).unwrap_err().to_string().contains("longer than"));

        let sum = vec!["1"; 400].join("+");
        assert_eq!(evaluate(&sum).unwrap(), Number::Int(400));
    }

    #[test]
    fn test_malformed() {
        assert!(evaluate("").is_err());
        assert!(evaluate("   ").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("sqrt 4").is_err());
        assert!(evaluate("*3").is_err());
    }
}
