//! Syntax tree for Carefree tag templates.
//!
//! The parser knows the shape of every construct but nothing about which
//! tags exist: tag names and attributes are carried verbatim in
//! [`TagNode`] and validated later by the tag registry.

mod lexer;
mod parser;
pub mod token;

use thiserror::Error;

pub use lexer::tokenize;

/// Prefix used when none is configured: `{carefree:arclist}`.
pub const DEFAULT_PREFIX: &str = "carefree";

// ============================================================================
// Location
// ============================================================================

/// Location in source code (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

// ============================================================================
// AST Nodes
// ============================================================================

/// A parsed template consisting of the linear list of nodes.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<AstNode>,
    location: Location,
}

impl Template {
    pub fn new(nodes: Vec<AstNode>, location: Location) -> Self {
        Self { nodes, location }
    }

    pub fn nodes(&self) -> &[AstNode] {
        &self.nodes
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

#[derive(Debug, Clone)]
pub enum AstNode {
    Text(TextNode),
    Output(OutputNode),
    If(IfBlock),
    Foreach(ForeachBlock),
    Tag(TagNode),
}

impl AstNode {
    pub fn location(&self) -> Location {
        match self {
            AstNode::Text(n) => n.location,
            AstNode::Output(n) => n.location,
            AstNode::If(n) => n.location,
            AstNode::Foreach(n) => n.location,
            AstNode::Tag(n) => n.location,
        }
    }
}

/// Raw text content.
#[derive(Debug, Clone)]
pub struct TextNode {
    pub content: String,
    pub location: Location,
}

/// Variable output: `{$path}` or `{$path|raw}`
#[derive(Debug, Clone)]
pub struct OutputNode {
    pub path: Path,
    pub raw: bool,
    pub location: Location,
}

/// Substrate conditional: `{if $cond}` ... `{else}` ... `{/if}`
#[derive(Debug, Clone)]
pub struct IfBlock {
    pub condition: Path,
    pub negated: bool,
    pub then_branch: Vec<AstNode>,
    pub else_branch: Option<Vec<AstNode>>,
    pub location: Location,
}

/// Substrate loop: `{foreach $collection as item}` ... `{/foreach}`
#[derive(Debug, Clone)]
pub struct ForeachBlock {
    pub collection: Path,
    pub item_ident: String,
    pub body: Vec<AstNode>,
    pub location: Location,
}

/// A tag occurrence: `{prefix:name attr="v"}body{/prefix:name}` or `{prefix:name /}`
#[derive(Debug, Clone)]
pub struct TagNode {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// `None` for the self-closing form.
    pub body: Option<Vec<AstNode>>,
    pub location: Location,
}

impl TagNode {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_self_closing(&self) -> bool {
        self.body.is_none()
    }
}

/// Attribute as written: the value is the raw text between the quotes.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub location: Location,
}

/// A dot-separated path (e.g., article.category.name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
    location: Location,
}

impl Path {
    pub fn new(segments: Vec<String>, location: Location) -> Self {
        Self { segments, location }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn root(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Returns the path as a dot-separated string.
    pub fn as_str(&self) -> String {
        self.segments.join(".")
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{message} at line {line}, column {column}")]
    SyntaxError {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("unclosed comment starting at line {line}, column {column}")]
    UnclosedComment { line: usize, column: usize },

    #[error("'{name}' opened at line {line}, column {column} is never closed")]
    UnclosedBlock {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("expected closing tag for '{expected}', found '{found}' at line {line}, column {column}")]
    MismatchedClose {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("malformed attribute on tag '{tag}': {message} at line {line}, column {column}")]
    MalformedAttribute {
        tag: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("invalid identifier '{name}' at line {line}, column {column}")]
    InvalidIdentifier {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("invalid tag prefix '{0}'")]
    InvalidPrefix(String),
}

impl ParseError {
    /// Line and column the error points at, when it has one.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            ParseError::SyntaxError { line, column, .. }
            | ParseError::UnclosedComment { line, column }
            | ParseError::UnclosedBlock { line, column, .. }
            | ParseError::MismatchedClose { line, column, .. }
            | ParseError::MalformedAttribute { line, column, .. }
            | ParseError::InvalidIdentifier { line, column, .. } => Some((*line, *column)),
            ParseError::InvalidPrefix(_) => None,
        }
    }
}

/// Check that a string is a plain identifier: [A-Za-z_][A-Za-z0-9_]*
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check that a string can name a binding: an identifier not starting with `_`.
///
/// Names starting with `_` are reserved for loop and paging metadata.
pub fn is_binding_name(name: &str) -> bool {
    is_identifier(name) && !name.starts_with('_')
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a template source string using the default `carefree` prefix.
pub fn parse(source: &str) -> Result<Template, ParseError> {
    parse_with_prefix(source, DEFAULT_PREFIX)
}

/// Parse a template source string recognising tags written as `{prefix:name}`.
pub fn parse_with_prefix(source: &str, prefix: &str) -> Result<Template, ParseError> {
    if !is_identifier(prefix) {
        return Err(ParseError::InvalidPrefix(prefix.to_string()));
    }
    let tokens = lexer::tokenize(source, prefix)?;
    parser::parse(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("article"));
        assert!(is_identifier("__first__"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_binding_name_rules() {
        assert!(is_binding_name("article"));
        assert!(!is_binding_name("__index__"));
        assert!(!is_binding_name("a.b"));
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(matches!(
            parse_with_prefix("x", "bad prefix"),
            Err(ParseError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_custom_prefix() {
        let template = parse_with_prefix("{cf:config name=\"x\" /}", "cf").unwrap();
        assert!(matches!(&template.nodes()[0], AstNode::Tag(tag) if tag.name == "config"));
    }
}
