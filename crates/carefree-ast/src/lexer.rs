//! Hand-written lexer for Carefree templates.
//!
//! Two-mode state machine:
//! - Text mode: accumulates raw text until a construct opener
//!   (`{$`, `{if $`, `{else}`, `{/if}`, `{foreach $`, `{/foreach}`,
//!   `{prefix:name`, `{/prefix:name}`, `{/* ... */}`)
//! - Construct mode: tokenizes sigils, identifiers and attribute values
//!   until `}` or `/}`
//!
//! A `{` that opens none of the above is plain text, so inline styles and
//! scripts pass through untouched.

use crate::token::{Token, TokenType};
use crate::{Location, ParseError};

/// Tokenize a source string into a sequence of tokens.
pub fn tokenize(source: &str, prefix: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(source, prefix);
    lexer.tokenize()
}

/// What a `{` at the current position opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    Comment,
    Fixed(TokenType),
    TagOpen,
    TagClose,
}

struct Lexer<'a> {
    source: &'a str,
    prefix: &'a str,
    pos: usize,
    line: usize,
    col: usize,
    in_construct: bool,
    expect_value: bool,
}

impl<'a> Lexer<'a> {
    const COMMENT_OPEN: &'static str = "{/*";
    const COMMENT_CLOSE: &'static str = "*/}";

    fn new(source: &'a str, prefix: &'a str) -> Self {
        Self {
            source,
            prefix,
            pos: 0,
            line: 1,
            col: 1,
            in_construct: false,
            expect_value: false,
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while self.pos < self.source.len() {
            if self.in_construct {
                self.tokenize_construct(&mut tokens)?;
            } else {
                self.tokenize_text(&mut tokens)?;
            }
        }

        tokens.push(Token::new(TokenType::Eof, "", self.location()));
        Ok(tokens)
    }

    /// Tokenize text mode: accumulate text until a construct opener.
    fn tokenize_text(&mut self, tokens: &mut Vec<Token>) -> Result<(), ParseError> {
        let start_loc = self.location();
        let start = self.pos;

        while self.pos < self.source.len() {
            if self.current_byte() == Some(b'{') && self.opener().is_some() {
                break;
            }
            self.advance_char();
        }

        if self.pos > start {
            tokens.push(Token::new(
                TokenType::Text,
                &self.source[start..self.pos],
                start_loc,
            ));
        }

        if let Some(opener) = self.opener() {
            self.consume_opener(opener, tokens)?;
        }

        Ok(())
    }

    /// Classify the construct starting at the current `{`, if any.
    fn opener(&self) -> Option<Opener> {
        let rest = self.rest();
        if !rest.starts_with('{') {
            return None;
        }
        if rest.starts_with(Self::COMMENT_OPEN) {
            return Some(Opener::Comment);
        }
        for token_type in [
            TokenType::OutputOpen,
            TokenType::Else,
            TokenType::EndIf,
            TokenType::EndForeach,
        ] {
            if rest.starts_with(Self::token_literal(token_type)) {
                return Some(Opener::Fixed(token_type));
            }
        }
        // `{if $x}`, `{if !$x}` and `{foreach $xs as ...}` need their variable
        // sigil; `{if (a) ...}` in inline script stays text.
        for token_type in [TokenType::IfOpen, TokenType::ForeachOpen] {
            let Some(after) = rest.strip_prefix(Self::token_literal(token_type)) else {
                continue;
            };
            let operand = after.trim_start_matches([' ', '\t', '\r', '\n']);
            if operand.len() == after.len() {
                continue;
            }
            let operand = match token_type {
                TokenType::IfOpen => operand.strip_prefix('!').unwrap_or(operand),
                _ => operand,
            };
            if operand.starts_with('$') {
                return Some(Opener::Fixed(token_type));
            }
        }
        if self.prefixed_name_at(1).is_some() {
            return Some(Opener::TagOpen);
        }
        if rest.starts_with("{/") && self.prefixed_name_at(2).is_some() {
            return Some(Opener::TagClose);
        }
        None
    }

    /// Byte length of `prefix:name` starting `offset` bytes past the cursor.
    fn prefixed_name_at(&self, offset: usize) -> Option<usize> {
        let rest = self.rest().get(offset..)?;
        let after_prefix = rest.strip_prefix(self.prefix)?.strip_prefix(':')?;
        let name_len = after_prefix.bytes().take_while(|b| is_ident_byte(*b)).count();
        match after_prefix.bytes().next() {
            Some(b) if b.is_ascii_alphabetic() => Some(self.prefix.len() + 1 + name_len),
            _ => None,
        }
    }

    fn consume_opener(
        &mut self,
        opener: Opener,
        tokens: &mut Vec<Token>,
    ) -> Result<(), ParseError> {
        let loc = self.location();
        match opener {
            Opener::Comment => self.skip_comment(loc),
            Opener::Fixed(token_type) => {
                self.emit_fixed(tokens, token_type, loc);
                self.in_construct = matches!(
                    token_type,
                    TokenType::OutputOpen | TokenType::IfOpen | TokenType::ForeachOpen
                );
                Ok(())
            }
            Opener::TagOpen => {
                let name = self.read_prefixed_name(1);
                tokens.push(Token::new(TokenType::TagOpen, name, loc));
                self.in_construct = true;
                Ok(())
            }
            Opener::TagClose => {
                let name = self.read_prefixed_name(2);
                if self.current_byte() != Some(b'}') {
                    return Err(ParseError::SyntaxError {
                        message: format!("expected '}}' after closing tag '{name}'"),
                        line: loc.line,
                        column: loc.column,
                    });
                }
                self.advance_char();
                tokens.push(Token::new(TokenType::TagClose, name, loc));
                Ok(())
            }
        }
    }

    /// Consume `{`, optional `/`, the prefix and `:`, and return the tag name.
    fn read_prefixed_name(&mut self, offset: usize) -> String {
        let total = self.prefixed_name_at(offset).unwrap_or(0);
        let name_start = self.pos + offset + self.prefix.len() + 1;
        let name_end = self.pos + offset + total;
        let name = self.source[name_start..name_end].to_string();
        self.advance_bytes(offset + total);
        name
    }

    fn skip_comment(&mut self, loc: Location) -> Result<(), ParseError> {
        match self.rest().find(Self::COMMENT_CLOSE) {
            Some(idx) => {
                self.advance_bytes(idx + Self::COMMENT_CLOSE.len());
                Ok(())
            }
            None => Err(ParseError::UnclosedComment {
                line: loc.line,
                column: loc.column,
            }),
        }
    }

    /// Tokenize construct mode: sigils, identifiers, attribute values.
    fn tokenize_construct(&mut self, tokens: &mut Vec<Token>) -> Result<(), ParseError> {
        let Some(ch) = self.current_byte() else {
            return Ok(());
        };
        let loc = self.location();

        if self.expect_value && !is_whitespace(ch) {
            self.expect_value = false;
            return match ch {
                b'"' | b'\'' => self.tokenize_quoted(tokens, ch, loc),
                _ => self.tokenize_bare(tokens, loc),
            };
        }

        match ch {
            b'}' => {
                self.emit_fixed(tokens, TokenType::Close, loc);
                self.in_construct = false;
            }
            b'/' if self.rest().starts_with(Self::token_literal(TokenType::SelfClose)) => {
                self.emit_fixed(tokens, TokenType::SelfClose, loc);
                self.in_construct = false;
            }
            b'$' => self.emit_fixed(tokens, TokenType::Dollar, loc),
            b'.' => self.emit_fixed(tokens, TokenType::Dot, loc),
            b'|' => self.emit_fixed(tokens, TokenType::Pipe, loc),
            b'!' => self.emit_fixed(tokens, TokenType::Bang, loc),
            b'=' => {
                self.emit_fixed(tokens, TokenType::Equal, loc);
                self.expect_value = true;
            }
            b if is_whitespace(b) => {
                let start = self.pos;
                while self.current_byte().map_or(false, is_whitespace) {
                    self.advance_char();
                }
                tokens.push(Token::new(
                    TokenType::Whitespace,
                    &self.source[start..self.pos],
                    loc,
                ));
            }
            b if is_ident_byte(b) => {
                let start = self.pos;
                while self.current_byte().map_or(false, is_ident_byte) {
                    self.advance_char();
                }
                tokens.push(Token::new(
                    TokenType::Ident,
                    &self.source[start..self.pos],
                    loc,
                ));
            }
            _ => {
                let found = self.rest().chars().next().unwrap_or('?');
                return Err(ParseError::SyntaxError {
                    message: format!("unexpected character '{found}'"),
                    line: loc.line,
                    column: loc.column,
                });
            }
        }

        Ok(())
    }

    /// Quoted attribute value. A backslash escapes the quote character and itself.
    fn tokenize_quoted(
        &mut self,
        tokens: &mut Vec<Token>,
        quote: u8,
        loc: Location,
    ) -> Result<(), ParseError> {
        self.advance_char();
        let mut value = String::new();

        loop {
            let Some(c) = self.rest().chars().next() else {
                return Err(ParseError::SyntaxError {
                    message: "unterminated attribute value".to_string(),
                    line: loc.line,
                    column: loc.column,
                });
            };
            if c as u32 == u32::from(quote) {
                self.advance_char();
                break;
            }
            if c == '\\' {
                let next = self.rest()[1..].chars().next();
                if let Some(n) = next.filter(|n| *n as u32 == u32::from(quote) || *n == '\\') {
                    self.advance_char();
                    self.advance_char();
                    value.push(n);
                    continue;
                }
            }
            value.push(c);
            self.advance_char();
        }

        tokens.push(Token::new(TokenType::Quoted, value, loc));
        Ok(())
    }

    /// Unquoted attribute value: runs until whitespace, `}` or `/}`.
    fn tokenize_bare(&mut self, tokens: &mut Vec<Token>, loc: Location) -> Result<(), ParseError> {
        let start = self.pos;
        while let Some(b) = self.current_byte() {
            if is_whitespace(b) || b == b'}' || self.rest().starts_with("/}") {
                break;
            }
            self.advance_char();
        }

        if self.pos == start {
            return Err(ParseError::SyntaxError {
                message: "expected attribute value after '='".to_string(),
                line: loc.line,
                column: loc.column,
            });
        }

        tokens.push(Token::new(TokenType::Bare, &self.source[start..self.pos], loc));
        Ok(())
    }

    /// Return the fixed literal for a token type.
    fn token_literal(token_type: TokenType) -> &'static str {
        token_type.literal().unwrap_or_default()
    }

    /// Emit a token with fixed literal text and advance by its byte length.
    fn emit_fixed(&mut self, tokens: &mut Vec<Token>, token_type: TokenType, loc: Location) {
        let literal = Self::token_literal(token_type);
        tokens.push(Token::new(token_type, literal, loc));
        self.advance_bytes(literal.len());
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn current_byte(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.col, self.pos)
    }

    /// Advance one character, updating line/column tracking.
    fn advance_char(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Advance until `n` bytes have been consumed.
    fn advance_bytes(&mut self, n: usize) {
        let target = (self.pos + n).min(self.source.len());
        while self.pos < target {
            self.advance_char();
        }
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
