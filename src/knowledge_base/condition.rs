//! Rule condition parsing
//!
//! Condition strings from the rule store are parsed once, at load time, into
//! the typed `Condition` tree. Nothing is evaluated as free text.
//!
//! ## Grammar
//!
//! ```text
//! condition  := conjunct ( ("or" | "||") conjunct )*
//! conjunct   := comparison ( ("and" | "&&") comparison )*
//! comparison := FIELD OP VALUE
//! OP         := < | > | <= | >= | = | == | != | ≤ | ≥
//! VALUE      := number | true | false
//! ```
//!
//! `and` binds tighter than `or`; there are no parentheses. A single
//! comparison is the common case.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::types::{Comparator, Condition, Field};

/// Why a condition string was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionParseError {
    #[error("condition is empty")]
    Empty,

    #[error("cannot parse comparison '{0}' (expected FIELD OP VALUE)")]
    Syntax(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid threshold '{value}' for {field}")]
    BadThreshold { field: Field, value: String },
}

fn comparison_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(<=|>=|==|!=|≤|≥|<|>|=)\s*(\S+)\s*$")
            .expect("comparison pattern is a valid regex")
    })
}

fn or_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+or\s+|\|\|").expect("or pattern is a valid regex"))
}

fn and_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+and\s+|&&").expect("and pattern is a valid regex"))
}

/// Parse a condition expression into a typed `Condition`.
pub fn parse_condition(expr: &str) -> Result<Condition, ConditionParseError> {
    if expr.trim().is_empty() {
        return Err(ConditionParseError::Empty);
    }

    let mut disjuncts = Vec::new();
    for conj in or_regex().split(expr) {
        let mut comparisons = Vec::new();
        for part in and_regex().split(conj) {
            comparisons.push(parse_comparison(part)?);
        }
        disjuncts.push(collapse(comparisons, Condition::All));
    }
    Ok(collapse(disjuncts, Condition::Any))
}

/// Single element stays bare; several are wrapped in the compound variant.
fn collapse(mut parts: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}

fn parse_comparison(text: &str) -> Result<Condition, ConditionParseError> {
    if text.trim().is_empty() {
        return Err(ConditionParseError::Empty);
    }
    let caps = comparison_regex()
        .captures(text)
        .ok_or_else(|| ConditionParseError::Syntax(text.trim().to_string()))?;

    let name = &caps[1];
    let field =
        Field::from_name(name).ok_or_else(|| ConditionParseError::UnknownField(name.to_string()))?;
    let op = Comparator::from_symbol(&caps[2])
        .ok_or_else(|| ConditionParseError::Syntax(text.trim().to_string()))?;
    let threshold = parse_threshold(field, &caps[3])?;

    Ok(Condition::Compare { field, op, threshold })
}

fn parse_threshold(field: Field, raw: &str) -> Result<f64, ConditionParseError> {
    let bad = || ConditionParseError::BadThreshold {
        field,
        value: raw.to_string(),
    };

    match raw.to_ascii_lowercase().as_str() {
        "true" if field.is_boolean() => return Ok(1.0),
        "false" if field.is_boolean() => return Ok(0.0),
        "true" | "false" => return Err(bad()),
        _ => {}
    }

    let value: f64 = raw.parse().map_err(|_| bad())?;
    if !value.is_finite() {
        return Err(bad());
    }
    if field.is_boolean() && value != 0.0 && value != 1.0 {
        return Err(bad());
    }
    Ok(value)
}

impl std::str::FromStr for Condition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_condition(s)
    }
}

impl TryFrom<String> for Condition {
    type Error = ConditionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_condition(&s)
    }
}
