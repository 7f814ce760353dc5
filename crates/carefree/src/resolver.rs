//! Attribute value resolution.
//!
//! Every attribute written on a tag is normalized once, at compile time, into
//! an [`AttributeValue`]: either a literal or a reference to template state.
//!
//! Rules, in order:
//! 1. The empty string is an empty string literal.
//! 2. `$a.b.c` is a reference with segments `["a", "b", "c"]`.
//! 3. A bare dotted path whose root is a known name (a binding in scope or a
//!    configured global) is a reference as well.
//! 4. `^-?\d+(\.\d+)?$` is a numeric literal.
//! 5. `true` / `false` are boolean literals.
//! 6. Anything else is a string literal.

use crate::context::Context;
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());

static PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").unwrap());

pub const REFERENCE_SIGIL: char = '$';

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Integer(n) => Value::Integer(*n),
            Literal::Float(f) => Value::Float(*f),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Literal(Literal),
    Reference(Vec<String>),
}

impl AttributeValue {
    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::Literal(Literal::Str(s.into()))
    }

    pub fn integer(n: i64) -> Self {
        AttributeValue::Literal(Literal::Integer(n))
    }

    pub fn reference<S: AsRef<str>>(segments: &[S]) -> Self {
        AttributeValue::Reference(segments.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, AttributeValue::Reference(_))
    }

    /// Value at render time. Unresolvable references give `Null`.
    pub fn evaluate(&self, context: &Context) -> Value {
        match self {
            AttributeValue::Literal(literal) => literal.to_value(),
            AttributeValue::Reference(path) => context.resolve(path).clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("malformed reference '{0}'")]
pub struct MalformedReference(pub String);

/// Resolve with no names known in scope: only `$`-prefixed values are references.
pub fn resolve(raw: &str) -> Result<AttributeValue, MalformedReference> {
    resolve_with(raw, |_| false)
}

/// Resolve an attribute string, treating bare paths rooted at a known name as references.
pub fn resolve_with<F>(raw: &str, is_known: F) -> Result<AttributeValue, MalformedReference>
where
    F: Fn(&str) -> bool,
{
    if raw.is_empty() {
        return Ok(AttributeValue::string(""));
    }

    if let Some(path) = raw.strip_prefix(REFERENCE_SIGIL) {
        if !PATH.is_match(path) {
            return Err(MalformedReference(raw.to_string()));
        }
        return Ok(AttributeValue::Reference(split_path(path)));
    }

    if PATH.is_match(raw) {
        let segments = split_path(raw);
        if is_known(&segments[0]) {
            return Ok(AttributeValue::Reference(segments));
        }
    }

    if NUMERIC.is_match(raw) {
        return Ok(AttributeValue::Literal(numeric_literal(raw)));
    }

    Ok(AttributeValue::Literal(match raw {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => Literal::Str(raw.to_string()),
    }))
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn numeric_literal(raw: &str) -> Literal {
    if !raw.contains('.') {
        if let Ok(n) = raw.parse::<i64>() {
            return Literal::Integer(n);
        }
    }
    match raw.parse::<f64>() {
        Ok(f) => Literal::Float(f),
        Err(_) => Literal::Str(raw.to_string()),
    }
}
