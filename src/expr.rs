//! Sandboxed expression language for match conditions, attribute
//! recomputation, and grammar variables.
//!
//! Expressions are parsed once into a small AST and evaluated against a flat
//! environment of bound variables. The operation set is a fixed whitelist:
//! arithmetic, comparisons, boolean logic, and a handful of named vector
//! functions. There is no assignment, no iteration, and no way to reach
//! outside the environment.

use std::fmt;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::geometry::{angle_between, Vec2};

/// Errors from parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error at byte {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("wrong number of arguments to `{name}`: expected {expected}, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),
}

type ExprResult<T> = std::result::Result<T, ExprError>;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Str(String),
    Vec2(Vec2),
    Null,
}

impl Value {
    pub fn as_num(&self) -> ExprResult<f64> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(ExprError::Type(format!("expected number, got {other}"))),
        }
    }

    pub fn as_bool(&self) -> ExprResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ExprError::Type(format!("expected bool, got {other}"))),
        }
    }

    pub fn as_vec2(&self) -> ExprResult<Vec2> {
        match self {
            Value::Vec2(v) => Ok(*v),
            other => Err(ExprError::Type(format!("expected vector, got {other}"))),
        }
    }

    /// Convert a stored attribute value into a runtime value.
    ///
    /// Arrays of two numbers become vectors; objects are opaque and read as
    /// null.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) if items.len() == 2 => {
                match (items[0].as_f64(), items[1].as_f64()) {
                    (Some(x), Some(y)) => Value::Vec2(Vec2::new(x, y)),
                    _ => Value::Null,
                }
            }
            _ => Value::Null,
        }
    }

    /// Convert back into an attribute value for write-back.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Vec2(v) => serde_json::json!([v.x, v.y]),
            Value::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Null => write!(f, "null"),
        }
    }
}

/// Flat environment of bound variables.
///
/// Dotted identifiers (`old.x`, `anchor.label`) are plain keys here; the
/// binder decides the namespace layout.
#[derive(Debug, Default, Clone)]
pub struct Env {
    vars: FxHashMap<String, Value>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Bind every attribute of `attrs` under `prefix` (`prefix.key`), or as
    /// bare names when `prefix` is empty. Reserved `.`-prefixed keys are
    /// skipped.
    pub fn bind_attrs(
        &mut self,
        prefix: &str,
        attrs: &indexmap::IndexMap<String, serde_json::Value>,
    ) {
        for (key, value) in attrs {
            if key.starts_with('.') {
                continue;
            }
            let name = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            self.vars.insert(name, Value::from_json(value));
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Parse an expression from source text.
    pub fn parse(source: &str) -> ExprResult<Expr> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression(0)?;
        match parser.peek() {
            Token::Eof => Ok(expr),
            tok => Err(ExprError::Parse {
                pos: parser.byte_pos(),
                msg: format!("unexpected trailing token {tok:?}"),
            }),
        }
    }

    /// Evaluate against an environment.
    pub fn eval(&self, env: &Env) -> ExprResult<Value> {
        match self {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => env
                .lookup(name)
                .cloned()
                .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
            Expr::Neg(inner) => match inner.eval(env)? {
                Value::Num(n) => Ok(Value::Num(-n)),
                Value::Vec2(v) => Ok(Value::Vec2(v.scale(-1.0))),
                other => Err(ExprError::Type(format!("cannot negate {other}"))),
            },
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval(env)?.as_bool()?)),
            Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, env),
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(env)?);
                }
                eval_call(name, &values)
            }
        }
    }

    /// True if this expression is a bare identifier (a plain label rather
    /// than a formula).
    pub fn is_bare_var(&self) -> bool {
        matches!(self, Expr::Var(_))
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, env: &Env) -> ExprResult<Value> {
    // Short-circuit boolean operators before evaluating the right side.
    match op {
        BinOp::And => {
            return if !lhs.eval(env)?.as_bool()? {
                Ok(Value::Bool(false))
            } else {
                Ok(Value::Bool(rhs.eval(env)?.as_bool()?))
            };
        }
        BinOp::Or => {
            return if lhs.eval(env)?.as_bool()? {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(rhs.eval(env)?.as_bool()?))
            };
        }
        _ => {}
    }
    let left = lhs.eval(env)?;
    let right = rhs.eval(env)?;
    match op {
        BinOp::Add => match (&left, &right) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
            (Value::Vec2(a), Value::Vec2(b)) => Ok(Value::Vec2(*a + *b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(ExprError::Type(format!("cannot add {left} and {right}"))),
        },
        BinOp::Sub => match (&left, &right) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a - b)),
            (Value::Vec2(a), Value::Vec2(b)) => Ok(Value::Vec2(*a - *b)),
            _ => Err(ExprError::Type(format!(
                "cannot subtract {right} from {left}"
            ))),
        },
        BinOp::Mul => match (&left, &right) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a * b)),
            (Value::Vec2(a), Value::Num(b)) => Ok(Value::Vec2(a.scale(*b))),
            (Value::Num(a), Value::Vec2(b)) => Ok(Value::Vec2(b.scale(*a))),
            // Vector * vector is the dot product, as in the original
            // geometry helpers.
            (Value::Vec2(a), Value::Vec2(b)) => Ok(Value::Num(a.dot(*b))),
            _ => Err(ExprError::Type(format!(
                "cannot multiply {left} and {right}"
            ))),
        },
        BinOp::Div => match (&left, &right) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a / b)),
            (Value::Vec2(a), Value::Num(b)) => Ok(Value::Vec2(a.scale(1.0 / b))),
            _ => Err(ExprError::Type(format!("cannot divide {left} by {right}"))),
        },
        BinOp::Rem => Ok(Value::Num(left.as_num()? % right.as_num()?)),
        BinOp::Eq => Ok(Value::Bool(left == right)),
        BinOp::Ne => Ok(Value::Bool(left != right)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = match (&left, &right) {
                (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let ord = ord.ok_or_else(|| {
                ExprError::Type(format!("cannot order {left} against {right}"))
            })?;
            let result = match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                BinOp::Ge => ord.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::And | BinOp::Or => unreachable!(),
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> ExprResult<()> {
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn eval_call(name: &str, args: &[Value]) -> ExprResult<Value> {
    match name {
        "abs" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_num()?.abs()))
        }
        "sqrt" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_num()?.sqrt()))
        }
        "floor" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_num()?.floor()))
        }
        "ceil" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_num()?.ceil()))
        }
        "sin" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_num()?.sin()))
        }
        "cos" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_num()?.cos()))
        }
        "atan2" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Num(args[0].as_num()?.atan2(args[1].as_num()?)))
        }
        "min" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Num(args[0].as_num()?.min(args[1].as_num()?)))
        }
        "max" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Num(args[0].as_num()?.max(args[1].as_num()?)))
        }
        "vec" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Vec2(Vec2::new(
                args[0].as_num()?,
                args[1].as_num()?,
            )))
        }
        "norm" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Num(args[0].as_vec2()?.norm()))
        }
        "angle" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Num(angle_between(
                args[0].as_vec2()?,
                args[1].as_vec2()?,
            )))
        }
        "rotate" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Vec2(args[0].as_vec2()?.rotate(args[1].as_num()?)))
        }
        "perp_left" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Vec2(args[0].as_vec2()?.perp_left()))
        }
        "perp_right" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Vec2(args[0].as_vec2()?.perp_right()))
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tokenizer and Pratt parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Op(BinOp),
    Not,
    LParen,
    RParen,
    Comma,
    Eof,
}

struct Spanned {
    token: Token,
    pos: usize,
}

fn tokenize(source: &str) -> ExprResult<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        let pos = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '(' => {
                tokens.push(Spanned { token: Token::LParen, pos });
                i += 1;
            }
            ')' => {
                tokens.push(Spanned { token: Token::RParen, pos });
                i += 1;
            }
            ',' => {
                tokens.push(Spanned { token: Token::Comma, pos });
                i += 1;
            }
            '+' => {
                tokens.push(Spanned { token: Token::Op(BinOp::Add), pos });
                i += 1;
            }
            '-' => {
                tokens.push(Spanned { token: Token::Op(BinOp::Sub), pos });
                i += 1;
            }
            '*' => {
                tokens.push(Spanned { token: Token::Op(BinOp::Mul), pos });
                i += 1;
            }
            '/' => {
                tokens.push(Spanned { token: Token::Op(BinOp::Div), pos });
                i += 1;
            }
            '%' => {
                tokens.push(Spanned { token: Token::Op(BinOp::Rem), pos });
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next_eq = bytes.get(i + 1) == Some(&b'=');
                let token = match (c, next_eq) {
                    ('=', true) => Token::Op(BinOp::Eq),
                    ('!', true) => Token::Op(BinOp::Ne),
                    ('<', true) => Token::Op(BinOp::Le),
                    ('>', true) => Token::Op(BinOp::Ge),
                    ('<', false) => Token::Op(BinOp::Lt),
                    ('>', false) => Token::Op(BinOp::Gt),
                    ('!', false) => Token::Not,
                    ('=', false) => {
                        return Err(ExprError::Parse {
                            pos,
                            msg: "single `=` is not an operator, use `==`".to_string(),
                        })
                    }
                    _ => unreachable!(),
                };
                i += if next_eq { 2 } else { 1 };
                tokens.push(Spanned { token, pos });
            }
            '&' | '|' => {
                if bytes.get(i + 1) != Some(&(c as u8)) {
                    return Err(ExprError::Parse {
                        pos,
                        msg: format!("expected `{c}{c}`"),
                    });
                }
                let op = if c == '&' { BinOp::And } else { BinOp::Or };
                tokens.push(Spanned { token: Token::Op(op), pos });
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j == bytes.len() {
                    return Err(ExprError::Parse {
                        pos,
                        msg: "unterminated string literal".to_string(),
                    });
                }
                tokens.push(Spanned {
                    token: Token::Str(source[start..j].to_string()),
                    pos,
                });
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit() || bytes[i] == b'.')
                {
                    i += 1;
                }
                let text = &source[start..i];
                let num = text.parse::<f64>().map_err(|_| ExprError::Parse {
                    pos,
                    msg: format!("malformed number `{text}`"),
                })?;
                tokens.push(Spanned { token: Token::Num(num), pos });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let b = bytes[i] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '.' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let ident = &source[start..i];
                let token = match ident {
                    "true" => Token::Ident("true".to_string()),
                    "false" => Token::Ident("false".to_string()),
                    _ => Token::Ident(ident.to_string()),
                };
                tokens.push(Spanned { token, pos });
            }
            other => {
                return Err(ExprError::Parse {
                    pos,
                    msg: format!("unexpected character `{other}`"),
                })
            }
        }
    }
    tokens.push(Spanned {
        token: Token::Eof,
        pos: bytes.len(),
    });
    Ok(tokens)
}

fn binding_power(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
        BinOp::Add | BinOp::Sub => 4,
        BinOp::Mul | BinOp::Div | BinOp::Rem => 5,
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn byte_pos(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> ExprResult<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ExprError::Parse {
                pos: self.byte_pos(),
                msg: format!("expected {expected:?}, found {:?}", self.peek()),
            })
        }
    }

    fn expression(&mut self, min_bp: u8) -> ExprResult<Expr> {
        let mut lhs = self.prefix()?;
        loop {
            let op = match self.peek() {
                Token::Op(op) => *op,
                _ => break,
            };
            let bp = binding_power(op);
            if bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.expression(bp + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> ExprResult<Expr> {
        let pos = self.byte_pos();
        match self.advance() {
            Token::Num(n) => Ok(Expr::Num(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => {
                if name == "true" {
                    return Ok(Expr::Bool(true));
                }
                if name == "false" {
                    return Ok(Expr::Bool(false));
                }
                if *self.peek() == Token::LParen {
                    self.advance();
                    let mut args = Vec::new();
                    if *self.peek() != Token::RParen {
                        loop {
                            args.push(self.expression(0)?);
                            if *self.peek() == Token::Comma {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::Op(BinOp::Sub) => Ok(Expr::Neg(Box::new(self.prefix()?))),
            Token::Not => Ok(Expr::Not(Box::new(self.prefix()?))),
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExprError::Parse {
                pos,
                msg: format!("unexpected token {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(source: &str, env: &Env) -> Value {
        Expr::parse(source).unwrap().eval(env).unwrap()
    }

    #[test]
    fn test_arithmetic_precedence() {
        let env = Env::new();
        assert_eq!(eval_str("1 + 2 * 3", &env), Value::Num(7.0));
        assert_eq!(eval_str("(1 + 2) * 3", &env), Value::Num(9.0));
        assert_eq!(eval_str("7 % 4", &env), Value::Num(3.0));
        assert_eq!(eval_str("-2 * 3", &env), Value::Num(-6.0));
    }

    #[test]
    fn test_comparisons_and_logic() {
        let mut env = Env::new();
        env.bind("a", Value::Num(1.0));
        assert_eq!(eval_str("a == 1", &env), Value::Bool(true));
        assert_eq!(eval_str("a != 1", &env), Value::Bool(false));
        assert_eq!(eval_str("a < 2 && a >= 1", &env), Value::Bool(true));
        assert_eq!(eval_str("a > 5 || a == 1", &env), Value::Bool(true));
        assert_eq!(eval_str("!(a == 1)", &env), Value::Bool(false));
    }

    #[test]
    fn test_short_circuit_skips_rhs() {
        // The right side references an unbound variable but must never be
        // evaluated.
        let env = Env::new();
        assert_eq!(eval_str("false && missing > 0", &env), Value::Bool(false));
        assert_eq!(eval_str("true || missing > 0", &env), Value::Bool(true));
    }

    #[test]
    fn test_string_literals() {
        let mut env = Env::new();
        env.bind("label", Value::Str("a".to_string()));
        assert_eq!(eval_str("label == 'a'", &env), Value::Bool(true));
        assert_eq!(
            eval_str("'x' + \"y\"", &env),
            Value::Str("xy".to_string())
        );
    }

    #[test]
    fn test_dotted_identifiers() {
        let mut env = Env::new();
        env.bind("old.x", Value::Num(4.0));
        assert_eq!(eval_str("old.x + 1", &env), Value::Num(5.0));
    }

    #[test]
    fn test_vector_functions() {
        let env = Env::new();
        assert_eq!(eval_str("norm(vec(3, 4))", &env), Value::Num(5.0));
        assert_eq!(
            eval_str("vec(1, 0) + vec(0, 2)", &env),
            Value::Vec2(Vec2::new(1.0, 2.0))
        );
        assert_eq!(eval_str("vec(1, 2) * vec(3, 4)", &env), Value::Num(11.0));
        assert_eq!(
            eval_str("2 * vec(1, 2)", &env),
            Value::Vec2(Vec2::new(2.0, 4.0))
        );
        assert_eq!(
            eval_str("perp_left(vec(1, 0))", &env),
            Value::Vec2(Vec2::new(0.0, 1.0))
        );
    }

    #[test]
    fn test_unknown_variable_errors() {
        let env = Env::new();
        let err = Expr::parse("missing + 1").unwrap().eval(&env).unwrap_err();
        assert_eq!(err, ExprError::UnknownVariable("missing".to_string()));
    }

    #[test]
    fn test_unknown_function_errors() {
        let env = Env::new();
        let err = Expr::parse("exec(1)").unwrap().eval(&env).unwrap_err();
        assert_eq!(err, ExprError::UnknownFunction("exec".to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expr::parse("1 +").is_err());
        assert!(Expr::parse("a = 1").is_err());
        assert!(Expr::parse("'open").is_err());
        assert!(Expr::parse("(1 + 2").is_err());
        assert!(Expr::parse("1 2").is_err());
    }

    #[test]
    fn test_bare_var_detection() {
        assert!(Expr::parse("a").unwrap().is_bare_var());
        assert!(!Expr::parse("a + 1").unwrap().is_bare_var());
    }

    #[test]
    fn test_json_value_round_trip() {
        let v = Value::from_json(&serde_json::json!([1.0, 2.0]));
        assert_eq!(v, Value::Vec2(Vec2::new(1.0, 2.0)));
        assert_eq!(v.to_json(), serde_json::json!([1.0, 2.0]));
        assert_eq!(
            Value::from_json(&serde_json::json!("s")),
            Value::Str("s".to_string())
        );
    }
}
