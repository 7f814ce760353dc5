//! Recursive descent parser for Carefree templates.
//!
//! Consumes the lexer's token stream and produces an AST. Tag bodies are
//! parsed recursively, so nested occurrences of the same tag close in the
//! right order without any bookkeeping beyond the call stack.

use crate::token::{Token, TokenType};
use crate::{
    is_identifier, AstNode, Attribute, ForeachBlock, IfBlock, Location, OutputNode, ParseError,
    Path, TagNode, Template, TextNode,
};

/// Parse a token stream into an AST Template.
pub fn parse(tokens: Vec<Token>) -> Result<Template, ParseError> {
    let mut parser = Parser::new(tokens);
    parser.parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(&mut self) -> Result<Template, ParseError> {
        let nodes = self.parse_nodes(&[])?;
        Ok(Template::new(nodes, Location::new(1, 1, 0)))
    }

    /// Parse nodes until EOF or one of the `until` token types.
    fn parse_nodes(&mut self, until: &[TokenType]) -> Result<Vec<AstNode>, ParseError> {
        let mut nodes = Vec::new();
        while self.current_type() != TokenType::Eof && !until.contains(&self.current_type()) {
            nodes.push(self.parse_node()?);
        }
        Ok(nodes)
    }

    fn parse_node(&mut self) -> Result<AstNode, ParseError> {
        match self.current_type() {
            TokenType::Text => {
                let token = self.advance();
                Ok(AstNode::Text(TextNode {
                    content: token.value,
                    location: token.location,
                }))
            }
            TokenType::OutputOpen => self.parse_output(),
            TokenType::IfOpen => self.parse_if(),
            TokenType::ForeachOpen => self.parse_foreach(),
            TokenType::TagOpen => self.parse_tag(),
            TokenType::Else => Err(self.syntax_error("'{else}' without '{if}'")),
            TokenType::EndIf => Err(self.syntax_error("'{/if}' without '{if}'")),
            TokenType::EndForeach => Err(self.syntax_error("'{/foreach}' without '{foreach}'")),
            TokenType::TagClose => {
                let name = self.current().value.clone();
                Err(self.syntax_error(&format!("closing tag '{name}' was never opened")))
            }
            other => Err(self.syntax_error(&format!("unexpected token {other:?}"))),
        }
    }

    // ------------------------------------------------------------------------
    // Substrate constructs
    // ------------------------------------------------------------------------

    fn parse_output(&mut self) -> Result<AstNode, ParseError> {
        let location = self.expect(TokenType::OutputOpen)?.location;
        let path = self.parse_path()?;

        let mut raw = false;
        if self.current_type() == TokenType::Pipe {
            self.advance();
            let modifier = self.expect(TokenType::Ident)?;
            match modifier.value.as_str() {
                "raw" => raw = true,
                other => {
                    return Err(ParseError::SyntaxError {
                        message: format!("unknown output modifier '{other}'"),
                        line: modifier.location.line,
                        column: modifier.location.column,
                    })
                }
            }
        }

        self.skip_whitespace();
        self.expect(TokenType::Close)?;
        Ok(AstNode::Output(OutputNode {
            path,
            raw,
            location,
        }))
    }

    fn parse_if(&mut self) -> Result<AstNode, ParseError> {
        let location = self.expect(TokenType::IfOpen)?.location;
        self.skip_whitespace();

        let negated = if self.current_type() == TokenType::Bang {
            self.advance();
            true
        } else {
            false
        };
        self.expect(TokenType::Dollar)?;
        let condition = self.parse_path()?;
        self.skip_whitespace();
        self.expect(TokenType::Close)?;

        let then_branch = self.parse_nodes(&[TokenType::Else, TokenType::EndIf])?;
        let else_branch = if self.current_type() == TokenType::Else {
            self.advance();
            Some(self.parse_nodes(&[TokenType::EndIf])?)
        } else {
            None
        };

        if self.current_type() != TokenType::EndIf {
            return Err(ParseError::UnclosedBlock {
                name: "if".to_string(),
                line: location.line,
                column: location.column,
            });
        }
        self.advance();

        Ok(AstNode::If(IfBlock {
            condition,
            negated,
            then_branch,
            else_branch,
            location,
        }))
    }

    fn parse_foreach(&mut self) -> Result<AstNode, ParseError> {
        let location = self.expect(TokenType::ForeachOpen)?.location;
        self.skip_whitespace();
        self.expect(TokenType::Dollar)?;
        let collection = self.parse_path()?;
        self.expect_whitespace()?;

        let keyword = self.expect(TokenType::Ident)?;
        if keyword.value != "as" {
            return Err(ParseError::SyntaxError {
                message: format!("expected 'as', found '{}'", keyword.value),
                line: keyword.location.line,
                column: keyword.location.column,
            });
        }
        self.expect_whitespace()?;

        if self.current_type() == TokenType::Dollar {
            self.advance();
        }
        let item = self.expect(TokenType::Ident)?;
        if !crate::is_binding_name(&item.value) {
            return Err(ParseError::InvalidIdentifier {
                name: item.value,
                line: item.location.line,
                column: item.location.column,
            });
        }
        self.skip_whitespace();
        self.expect(TokenType::Close)?;

        let body = self.parse_nodes(&[TokenType::EndForeach])?;
        if self.current_type() != TokenType::EndForeach {
            return Err(ParseError::UnclosedBlock {
                name: "foreach".to_string(),
                line: location.line,
                column: location.column,
            });
        }
        self.advance();

        Ok(AstNode::Foreach(ForeachBlock {
            collection,
            item_ident: item.value,
            body,
            location,
        }))
    }

    // ------------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------------

    fn parse_tag(&mut self) -> Result<AstNode, ParseError> {
        let open = self.expect(TokenType::TagOpen)?;
        let name = open.value;
        let location = open.location;
        let attributes = self.parse_attributes(&name)?;

        let self_closing = match self.current_type() {
            TokenType::SelfClose => true,
            TokenType::Close => false,
            TokenType::Eof => {
                return Err(ParseError::UnclosedBlock {
                    name,
                    line: location.line,
                    column: location.column,
                })
            }
            _ => {
                let token = self.current().clone();
                return Err(ParseError::MalformedAttribute {
                    tag: name,
                    message: format!("unexpected '{}'", token.value),
                    line: token.location.line,
                    column: token.location.column,
                });
            }
        };
        self.advance();

        if self_closing {
            return Ok(AstNode::Tag(TagNode {
                name,
                attributes,
                body: None,
                location,
            }));
        }

        let body = self.parse_nodes(&[TokenType::TagClose])?;
        if self.current_type() != TokenType::TagClose {
            return Err(ParseError::UnclosedBlock {
                name,
                line: location.line,
                column: location.column,
            });
        }
        let close = self.advance();
        if close.value != name {
            return Err(ParseError::MismatchedClose {
                expected: name,
                found: close.value,
                line: close.location.line,
                column: close.location.column,
            });
        }

        Ok(AstNode::Tag(TagNode {
            name,
            attributes,
            body: Some(body),
            location,
        }))
    }

    fn parse_attributes(&mut self, tag: &str) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes: Vec<Attribute> = Vec::new();

        loop {
            let had_space = self.current_type() == TokenType::Whitespace;
            self.skip_whitespace();
            if self.current_type() != TokenType::Ident {
                break;
            }

            let key = self.current().clone();
            if !had_space {
                return Err(self.malformed(tag, &key, "attributes must be separated by whitespace"));
            }
            self.advance();
            if !is_identifier(&key.value) {
                return Err(self.malformed(tag, &key, "attribute name must be an identifier"));
            }
            if self.current_type() != TokenType::Equal {
                return Err(self.malformed(tag, &key, "expected '=' after attribute name"));
            }
            self.advance();
            self.skip_whitespace();

            let value = match self.current_type() {
                TokenType::Quoted | TokenType::Bare => self.advance().value,
                _ => {
                    return Err(self.malformed(tag, &key, "expected attribute value"));
                }
            };

            if attributes.iter().any(|a| a.name == key.value) {
                return Err(ParseError::MalformedAttribute {
                    tag: tag.to_string(),
                    message: format!("duplicate attribute '{}'", key.value),
                    line: key.location.line,
                    column: key.location.column,
                });
            }

            attributes.push(Attribute {
                name: key.value,
                value,
                location: key.location,
            });
        }

        Ok(attributes)
    }

    fn malformed(&self, tag: &str, at: &Token, message: &str) -> ParseError {
        ParseError::MalformedAttribute {
            tag: tag.to_string(),
            message: message.to_string(),
            line: at.location.line,
            column: at.location.column,
        }
    }

    // ------------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------------

    /// Parse `segment(.segment)*`; the leading `$` has already been consumed.
    fn parse_path(&mut self) -> Result<Path, ParseError> {
        let first = self.expect(TokenType::Ident)?;
        let location = first.location;
        let mut segments = vec![first.value];

        while self.current_type() == TokenType::Dot {
            self.advance();
            segments.push(self.expect(TokenType::Ident)?.value);
        }

        if !is_identifier(&segments[0]) {
            return Err(ParseError::InvalidIdentifier {
                name: segments[0].clone(),
                line: location.line,
                column: location.column,
            });
        }

        Ok(Path::new(segments, location))
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_type(&self) -> TokenType {
        self.current().token_type
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: TokenType) -> Result<Token, ParseError> {
        if self.current_type() != expected {
            let token = self.current();
            let found = if token.token_type == TokenType::Eof {
                "end of input".to_string()
            } else {
                format!("'{}'", token.value)
            };
            return Err(self.syntax_error(&format!("expected {expected:?}, found {found}")));
        }
        Ok(self.advance())
    }

    fn expect_whitespace(&mut self) -> Result<(), ParseError> {
        if self.current_type() != TokenType::Whitespace {
            return Err(self.syntax_error("expected whitespace"));
        }
        self.skip_whitespace();
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.current_type() == TokenType::Whitespace {
            self.advance();
        }
    }

    fn syntax_error(&self, message: &str) -> ParseError {
        let location = self.current().location;
        ParseError::SyntaxError {
            message: message.to_string(),
            line: location.line,
            column: location.column,
        }
    }
}
