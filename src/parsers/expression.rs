//! Parser for the small expression language used by array lengths, arguments and conditions.
//!
//! Precedence, loosest first: `||`, `&&`, `|`, `&`, comparisons, shifts, `+ -`, `* / %`, unary.
//! Identifiers may contain single spaces between words (`Num Vertices`) and are normalised with
//! `registry::name_attribute`.

use super::{finish, Result, TextParseError};
use crate::expression::{BinOp, Expr, UnOp};
use crate::registry::name_attribute;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1, multispace0, space1},
    combinator::{all_consuming, map, not, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

fn ws<'a, O, F>(inner: F) -> impl Fn(&'a str) -> Result<'a, O>
where
    F: Fn(&'a str) -> Result<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn word(input: &str) -> Result<&str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// One path segment: words separated by single runs of spaces.
fn identifier(input: &str) -> Result<String> {
    map(recognize(pair(word, many0(pair(space1, word)))), |s: &str| {
        name_attribute(s)
    })(input)
}

fn path(input: &str) -> Result<Expr> {
    let (input, first) = identifier(input)?;
    let (input, rest) = many0(preceded(char('.'), identifier))(input)?;

    match (first.as_str(), rest.is_empty()) {
        ("true", true) => Ok((input, Expr::Bool(true))),
        ("false", true) => Ok((input, Expr::Bool(false))),
        _ => {
            let mut segments = vec![first];
            segments.extend(rest);
            Ok((input, Expr::Path(segments)))
        }
    }
}

fn hex_literal(input: &str) -> Result<Expr> {
    let (input, digits) = preceded(alt((tag("0x"), tag("0X"))), hex_digit1)(input)?;
    match i64::from_str_radix(digits, 16) {
        Ok(v) => Ok((input, Expr::Int(v))),
        Err(_) => Err(nom::Err::Failure(TextParseError::IntegerOverflow)),
    }
}

fn decimal_literal(input: &str) -> Result<Expr> {
    let (input, digits) = digit1(input)?;
    match digits.parse::<i64>() {
        Ok(v) => Ok((input, Expr::Int(v))),
        Err(_) => Err(nom::Err::Failure(TextParseError::IntegerOverflow)),
    }
}

fn parenthesized(input: &str) -> Result<Expr> {
    delimited(char('('), ws(or_expr), char(')'))(input)
}

fn primary(input: &str) -> Result<Expr> {
    alt((parenthesized, hex_literal, decimal_literal, path))(input)
}

fn unary_op(input: &str) -> Result<UnOp> {
    alt((
        map(terminated(char('!'), not(char('='))), |_| UnOp::Not),
        map(char('-'), |_| UnOp::Neg),
        map(char('~'), |_| UnOp::BitNot),
    ))(input)
}

fn unary(input: &str) -> Result<Expr> {
    let (rest, op) = match ws(unary_op)(input) {
        Ok(v) => v,
        Err(nom::Err::Error(_)) => return ws(primary)(input),
        Err(e) => return Err(e),
    };
    let (rest, operand) = unary(rest)?;
    Ok((rest, Expr::Unary(op, Box::new(operand))))
}

/// Parses `operand (operator operand)*` and folds it left associatively.
fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> Result<'a, Expr>,
    operator: fn(&'a str) -> Result<'a, BinOp>,
) -> Result<'a, Expr> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(pair(ws(operator), operand))(input)?;

    let expr = rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    });
    Ok((input, expr))
}

fn mul_op(input: &str) -> Result<BinOp> {
    alt((
        map(char('*'), |_| BinOp::Mul),
        map(char('/'), |_| BinOp::Div),
        map(char('%'), |_| BinOp::Rem),
    ))(input)
}

fn add_op(input: &str) -> Result<BinOp> {
    alt((map(char('+'), |_| BinOp::Add), map(char('-'), |_| BinOp::Sub)))(input)
}

fn shift_op(input: &str) -> Result<BinOp> {
    alt((map(tag("<<"), |_| BinOp::Shl), map(tag(">>"), |_| BinOp::Shr)))(input)
}

fn cmp_op(input: &str) -> Result<BinOp> {
    alt((
        map(tag("=="), |_| BinOp::Eq),
        map(tag("!="), |_| BinOp::Ne),
        map(tag("<="), |_| BinOp::Le),
        map(tag(">="), |_| BinOp::Ge),
        map(terminated(char('<'), not(char('<'))), |_| BinOp::Lt),
        map(terminated(char('>'), not(char('>'))), |_| BinOp::Gt),
    ))(input)
}

fn bit_and_op(input: &str) -> Result<BinOp> {
    map(terminated(char('&'), not(char('&'))), |_| BinOp::BitAnd)(input)
}

fn bit_or_op(input: &str) -> Result<BinOp> {
    map(terminated(char('|'), not(char('|'))), |_| BinOp::BitOr)(input)
}

fn and_op(input: &str) -> Result<BinOp> {
    map(tag("&&"), |_| BinOp::And)(input)
}

fn or_op(input: &str) -> Result<BinOp> {
    map(tag("||"), |_| BinOp::Or)(input)
}

fn mul_expr(input: &str) -> Result<Expr> {
    left_assoc(input, unary, mul_op)
}

fn add_expr(input: &str) -> Result<Expr> {
    left_assoc(input, mul_expr, add_op)
}

fn shift_expr(input: &str) -> Result<Expr> {
    left_assoc(input, add_expr, shift_op)
}

fn cmp_expr(input: &str) -> Result<Expr> {
    left_assoc(input, shift_expr, cmp_op)
}

fn bit_and_expr(input: &str) -> Result<Expr> {
    left_assoc(input, cmp_expr, bit_and_op)
}

fn bit_or_expr(input: &str) -> Result<Expr> {
    left_assoc(input, bit_and_expr, bit_or_op)
}

fn and_expr(input: &str) -> Result<Expr> {
    left_assoc(input, bit_or_expr, and_op)
}

fn or_expr(input: &str) -> Result<Expr> {
    left_assoc(input, and_expr, or_op)
}

/// Parses a complete expression. Trailing input is an error.
pub fn parse_expression(input: &str) -> std::result::Result<Expr, TextParseError> {
    finish(all_consuming(ws(or_expr))(input))
}
