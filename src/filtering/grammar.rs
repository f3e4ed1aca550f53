//! Tokenizer for the `filter_by` mini-language.
//!
//! ```text
//! name¬foo/active=true|price>=100
//! ```
//!
//! Tokens are separated by `/` (AND) or `|` (OR); each token is `field<op>value` with
//! `op` one of `=`, `¬`, `<`, `>`, `<=`, `>=`. The operator is the first operator character in
//! the token, with the two-character forms taking precedence over `<` and `>`.

use crate::errors::{FilterWarning, WarningKind};

/// Comparison operator of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `=`
    Eq,
    /// `¬` (case-insensitive contains)
    Contains,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl FilterOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Contains => "¬",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Lt | Self::Gt | Self::Le | Self::Ge)
    }
}

/// How a token joins the expression built from the tokens before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `/`
    And,
    /// `|`
    Or,
}

impl Combinator {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One `field<op>value` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterToken<'a> {
    pub raw: &'a str,
    pub field: &'a str,
    pub op: FilterOp,
    pub value: &'a str,
    /// Divider that preceded this token; the first token is always `And`
    pub combinator: Combinator,
}

/// Split a `filter_by` expression into tokens. Segments without a usable shape come back as
/// warnings in place, so callers keep the original order.
#[must_use]
pub fn tokenize(expression: &str) -> Vec<Result<FilterToken<'_>, FilterWarning>> {
    let mut tokens = Vec::new();
    let mut combinator = Combinator::And;
    let mut start = 0;

    for (index, c) in expression.char_indices() {
        let divider = match c {
            '/' => Combinator::And,
            '|' => Combinator::Or,
            _ => continue,
        };
        push_segment(&mut tokens, &expression[start..index], combinator);
        combinator = divider;
        start = index + c.len_utf8();
    }
    push_segment(&mut tokens, &expression[start..], combinator);

    tokens
}

fn push_segment<'a>(
    tokens: &mut Vec<Result<FilterToken<'a>, FilterWarning>>,
    segment: &'a str,
    combinator: Combinator,
) {
    if segment.trim().is_empty() {
        return;
    }
    tokens.push(parse_token(segment, combinator));
}

/// Parse one segment. The earliest operator character wins; `<=`/`>=` are matched before
/// `<`/`>` at that position.
pub fn parse_token(segment: &str, combinator: Combinator) -> Result<FilterToken<'_>, FilterWarning> {
    let malformed = || FilterWarning::new(segment.trim(), WarningKind::MalformedToken);

    let (index, op, len) = segment
        .char_indices()
        .find_map(|(index, c)| {
            let next_is_eq = segment[index + c.len_utf8()..].starts_with('=');
            match c {
                '=' => Some((index, FilterOp::Eq, 1)),
                '¬' => Some((index, FilterOp::Contains, c.len_utf8())),
                '<' if next_is_eq => Some((index, FilterOp::Le, 2)),
                '>' if next_is_eq => Some((index, FilterOp::Ge, 2)),
                '<' => Some((index, FilterOp::Lt, 1)),
                '>' => Some((index, FilterOp::Gt, 1)),
                _ => None,
            }
        })
        .ok_or_else(malformed)?;

    let field = segment[..index].trim();
    let value = segment[index + len..].trim();
    if field.is_empty() || value.is_empty() {
        return Err(malformed());
    }

    Ok(FilterToken {
        raw: segment.trim(),
        field,
        op,
        value,
        combinator,
    })
}
