//! Token types for the Carefree lexer.

use crate::Location;

/// Token types produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Raw text content outside constructs.
    Text,
    /// `{$` - output open
    OutputOpen,
    /// `{if` - substrate conditional open
    IfOpen,
    /// `{else}`
    Else,
    /// `{/if}`
    EndIf,
    /// `{foreach` - substrate loop open
    ForeachOpen,
    /// `{/foreach}`
    EndForeach,
    /// `{prefix:name` - tag open; value holds the tag name
    TagOpen,
    /// `{/prefix:name}` - tag close; value holds the tag name
    TagClose,
    /// `$` - reference sigil
    Dollar,
    /// `.` - path separator
    Dot,
    /// `|` - output modifier separator
    Pipe,
    /// `!` - negation
    Bang,
    /// `=` - attribute assignment
    Equal,
    /// Quoted attribute value (quotes stripped, escapes applied)
    Quoted,
    /// Unquoted attribute value
    Bare,
    /// Whitespace inside a construct
    Whitespace,
    /// Identifier or numeric path segment: [A-Za-z0-9_]+
    Ident,
    /// `}` - closing delimiter
    Close,
    /// `/}` - self-closing delimiter
    SelfClose,
    /// End of file
    Eof,
}

impl TokenType {
    /// Fixed source literal for tokens that always look the same.
    pub fn literal(self) -> Option<&'static str> {
        match self {
            TokenType::OutputOpen => Some("{$"),
            TokenType::IfOpen => Some("{if"),
            TokenType::Else => Some("{else}"),
            TokenType::EndIf => Some("{/if}"),
            TokenType::ForeachOpen => Some("{foreach"),
            TokenType::EndForeach => Some("{/foreach}"),
            TokenType::Dollar => Some("$"),
            TokenType::Dot => Some("."),
            TokenType::Pipe => Some("|"),
            TokenType::Bang => Some("!"),
            TokenType::Equal => Some("="),
            TokenType::Close => Some("}"),
            TokenType::SelfClose => Some("/}"),
            _ => None,
        }
    }
}

/// A token with its type, value, and location.
#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub location: Location,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, location: Location) -> Self {
        Self {
            token_type,
            value: value.into(),
            location,
        }
    }
}
