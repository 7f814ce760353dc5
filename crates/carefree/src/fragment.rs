//! Compiled representation of a template.
//!
//! Tag compilers lower each occurrence into these nodes; the renderer
//! interprets them directly.

use crate::context::Context;
use crate::resolver::AttributeValue;
use crate::value::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub enum Fragment {
    /// Text emitted as is.
    Literal(String),
    /// A value written into output; `escape` is subject to the engine's `escape_html`.
    VariableRef { value: AttributeValue, escape: bool },
    Conditional {
        test: Condition,
        then: Vec<Fragment>,
        otherwise: Vec<Fragment>,
    },
    Loop(Box<LoopFragment>),
    ProviderCall(Box<ProviderCall>),
    Cached {
        key: AttributeValue,
        ttl: AttributeValue,
        body: Vec<Fragment>,
    },
    Group {
        source: AttributeValue,
        by: Vec<String>,
        bind: String,
        body: Vec<Fragment>,
    },
    Assign { name: String, value: AttributeValue },
    Date {
        value: AttributeValue,
        format: String,
        default: Option<AttributeValue>,
    },
    Paging(Box<PagingFragment>),
}

/// Iteration over data already in scope.
#[derive(Debug, Clone)]
pub struct LoopFragment {
    pub source: AttributeValue,
    pub bind: String,
    pub key_bind: Option<String>,
    pub offset: Option<AttributeValue>,
    pub limit: Option<AttributeValue>,
    pub modulo: Option<AttributeValue>,
    pub body: Vec<Fragment>,
    pub empty: Option<AttributeValue>,
}

#[derive(Debug, Clone)]
pub struct ProviderCall {
    /// Tag the call was compiled from, for diagnostics.
    pub tag: String,
    pub provider: String,
    pub kind: CallKind,
}

#[derive(Debug, Clone)]
pub enum CallKind {
    List(ListCall),
    Single(SingleCall),
    Value(ValueCall),
}

#[derive(Debug, Clone)]
pub struct ListCall {
    /// Filter attributes in source order, forwarded under their own names.
    pub filters: Vec<(String, AttributeValue)>,
    pub limit: Option<AttributeValue>,
    pub offset: Option<AttributeValue>,
    pub order: Option<AttributeValue>,
    /// Current page; presence turns paging on.
    pub page: Option<AttributeValue>,
    pub page_size: Option<AttributeValue>,
    pub modulo: Option<AttributeValue>,
    pub bind: String,
    pub body: Vec<Fragment>,
    pub empty: Option<AttributeValue>,
}

#[derive(Debug, Clone)]
pub struct SingleCall {
    pub key: AttributeValue,
    pub field: String,
    pub bind: String,
    pub body: Vec<Fragment>,
    pub empty: Option<AttributeValue>,
}

#[derive(Debug, Clone)]
pub struct ValueCall {
    pub name: AttributeValue,
    pub params: Vec<(String, AttributeValue)>,
    pub default: Option<AttributeValue>,
    pub escape: bool,
}

/// Page navigation: a loop over page links, or `<ul>` markup when `links` is `None`.
#[derive(Debug, Clone)]
pub struct PagingFragment {
    pub total: AttributeValue,
    pub page_size: AttributeValue,
    pub page: AttributeValue,
    pub url: Option<AttributeValue>,
    pub size: Option<AttributeValue>,
    pub links: Option<LinkLoop>,
}

#[derive(Debug, Clone)]
pub struct LinkLoop {
    pub bind: String,
    pub body: Vec<Fragment>,
}

// ============================================================================
// Conditions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Egt,
    Elt,
    In,
}

impl CompareOp {
    /// Attribute names of the `if` tag, in evaluation order.
    pub const ATTRIBUTES: [(&'static str, CompareOp); 7] = [
        ("eq", CompareOp::Eq),
        ("neq", CompareOp::Neq),
        ("gt", CompareOp::Gt),
        ("lt", CompareOp::Lt),
        ("egt", CompareOp::Egt),
        ("elt", CompareOp::Elt),
        ("in", CompareOp::In),
    ];

    fn apply(self, left: &Value, right: &Value) -> bool {
        let ordering = || left.compare(right);
        match self {
            CompareOp::Eq => left.loose_eq(right),
            CompareOp::Neq => !left.loose_eq(right),
            CompareOp::Gt => ordering() == Some(Ordering::Greater),
            CompareOp::Lt => ordering() == Some(Ordering::Less),
            CompareOp::Egt => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Elt => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::In => match right {
                Value::Array(items) => items.iter().any(|item| left.loose_eq(item)),
                other => {
                    let needle = left.stringify();
                    other.stringify().split(',').any(|part| part.trim() == needle)
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum Condition {
    Truthy(AttributeValue),
    Not(Box<Condition>),
    Compare {
        left: AttributeValue,
        op: CompareOp,
        right: AttributeValue,
    },
    All(Vec<Condition>),
}

impl Condition {
    pub fn evaluate(&self, context: &Context) -> bool {
        match self {
            Condition::Truthy(value) => value.evaluate(context).is_truthy(),
            Condition::Not(inner) => !inner.evaluate(context),
            Condition::Compare { left, op, right } => {
                op.apply(&left.evaluate(context), &right.evaluate(context))
            }
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(context)),
        }
    }
}
