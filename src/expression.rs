//! Expressions over sibling attributes, used for array lengths, arguments and conditions.

use crate::error::{DataError, Result, SchemaError};
use crate::parsers::expression::parse_expression;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    BitOr,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::BitOr => "|",
            BinOp::BitAnd => "&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    /// Attribute lookup, possibly dotted into nested compounds.
    Path(Vec<String>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a [String]>) {
        match self {
            Expr::Int(_) | Expr::Bool(_) => {}
            Expr::Path(p) => out.push(p),
            Expr::Unary(_, e) => e.collect_paths(out),
            Expr::Binary(_, l, r) => {
                l.collect_paths(out);
                r.collect_paths(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Bool(v) => write!(f, "{}", v),
            Expr::Path(p) => write!(f, "{}", p.join(".")),
            Expr::Unary(UnOp::Not, e) => write!(f, "!{}", e),
            Expr::Unary(UnOp::Neg, e) => write!(f, "-{}", e),
            Expr::Unary(UnOp::BitNot, e) => write!(f, "~{}", e),
            Expr::Binary(op, l, r) => write!(f, "({} {} {})", l, op.symbol(), r),
        }
    }
}

/// Result of evaluating an expression. `Seq` comes from looking up an array of integers and is
/// only meaningful as a whole result (per-row lengths of a jagged array).
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Int(i64),
    Bool(bool),
    Seq(Vec<i64>),
}

impl ExprValue {
    fn as_int(&self, context: &Expression) -> Result<i64> {
        match self {
            ExprValue::Int(v) => Ok(*v),
            ExprValue::Bool(b) => Ok(i64::from(*b)),
            ExprValue::Seq(_) => Err(SchemaError::TypeMismatch(format!(
                "array used as a scalar in '{}'",
                context.source
            ))
            .into()),
        }
    }

    fn truthy(&self, context: &Expression) -> Result<bool> {
        self.as_int(context).map(|v| v != 0)
    }
}

/// Anything an expression can look names up in.
pub trait Scope {
    fn lookup(&self, path: &[String]) -> Result<ExprValue>;
}

impl Scope for HashMap<String, ExprValue> {
    fn lookup(&self, path: &[String]) -> Result<ExprValue> {
        self.get(&path.join("."))
            .cloned()
            .ok_or_else(|| SchemaError::UnknownIdentifier(path.join(".")).into())
    }
}

/// A parsed expression together with its source text. Evaluation has no side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> std::result::Result<Self, SchemaError> {
        let root = parse_expression(source).map_err(|e| SchemaError::MalformedExpression {
            expression: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Expression {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Every attribute path the expression reads.
    pub fn identifiers(&self) -> Vec<&[String]> {
        let mut out = Vec::new();
        self.root.collect_paths(&mut out);
        out
    }

    pub fn eval(&self, scope: &dyn Scope) -> Result<ExprValue> {
        self.eval_node(&self.root, scope)
    }

    pub fn eval_int(&self, scope: &dyn Scope) -> Result<i64> {
        self.eval(scope)?.as_int(self)
    }

    pub fn eval_bool(&self, scope: &dyn Scope) -> Result<bool> {
        self.eval(scope)?.truthy(self)
    }

    fn eval_node(&self, node: &Expr, scope: &dyn Scope) -> Result<ExprValue> {
        match node {
            Expr::Int(v) => Ok(ExprValue::Int(*v)),
            Expr::Bool(v) => Ok(ExprValue::Bool(*v)),
            Expr::Path(p) => scope.lookup(p),
            Expr::Unary(op, e) => {
                let v = self.eval_node(e, scope)?;
                Ok(match op {
                    UnOp::Not => ExprValue::Bool(!v.truthy(self)?),
                    UnOp::Neg => ExprValue::Int(v.as_int(self)?.wrapping_neg()),
                    UnOp::BitNot => ExprValue::Int(!v.as_int(self)?),
                })
            }
            Expr::Binary(BinOp::And, l, r) => {
                if !self.eval_node(l, scope)?.truthy(self)? {
                    return Ok(ExprValue::Bool(false));
                }
                Ok(ExprValue::Bool(self.eval_node(r, scope)?.truthy(self)?))
            }
            Expr::Binary(BinOp::Or, l, r) => {
                if self.eval_node(l, scope)?.truthy(self)? {
                    return Ok(ExprValue::Bool(true));
                }
                Ok(ExprValue::Bool(self.eval_node(r, scope)?.truthy(self)?))
            }
            Expr::Binary(op, l, r) => {
                let lhs = self.eval_node(l, scope)?;
                let rhs = self.eval_node(r, scope)?;
                self.binary(*op, &lhs, &rhs)
            }
        }
    }

    fn binary(&self, op: BinOp, lhs: &ExprValue, rhs: &ExprValue) -> Result<ExprValue> {
        if let (ExprValue::Seq(a), ExprValue::Seq(b)) = (lhs, rhs) {
            return match op {
                BinOp::Eq => Ok(ExprValue::Bool(a == b)),
                BinOp::Ne => Ok(ExprValue::Bool(a != b)),
                _ => Err(SchemaError::TypeMismatch(format!(
                    "operator '{}' applied to arrays in '{}'",
                    op.symbol(),
                    self.source
                ))
                .into()),
            };
        }

        let a = lhs.as_int(self)?;
        let b = rhs.as_int(self)?;
        let shift = |b: i64| u32::try_from(b).ok();

        Ok(match op {
            BinOp::Eq => ExprValue::Bool(a == b),
            BinOp::Ne => ExprValue::Bool(a != b),
            BinOp::Lt => ExprValue::Bool(a < b),
            BinOp::Le => ExprValue::Bool(a <= b),
            BinOp::Gt => ExprValue::Bool(a > b),
            BinOp::Ge => ExprValue::Bool(a >= b),
            BinOp::BitAnd => ExprValue::Int(a & b),
            BinOp::BitOr => ExprValue::Int(a | b),
            BinOp::Shl => ExprValue::Int(shift(b).and_then(|s| a.checked_shl(s)).unwrap_or(0)),
            BinOp::Shr => ExprValue::Int(shift(b).and_then(|s| a.checked_shr(s)).unwrap_or(0)),
            BinOp::Add => ExprValue::Int(a.wrapping_add(b)),
            BinOp::Sub => ExprValue::Int(a.wrapping_sub(b)),
            BinOp::Mul => ExprValue::Int(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Rem if b == 0 => {
                return Err(DataError::DivisionByZero(self.source.clone()).into())
            }
            BinOp::Div => ExprValue::Int(a.wrapping_div(b)),
            BinOp::Rem => ExprValue::Int(a.wrapping_rem(b)),
            BinOp::And | BinOp::Or => unreachable!("short-circuit operators are handled by eval_node"),
        })
    }
}

impl FromStr for Expression {
    type Err = SchemaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
