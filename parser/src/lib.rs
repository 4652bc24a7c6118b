pub mod ast;
pub mod errors;
pub mod grammar;
pub mod node;
pub mod scanner;
pub mod token;

pub use errors::{ParseError, ParseResult};
pub use node::{Node, NodeId};
pub use scanner::Scanner;

use pact_common::{SourceLocation, Span};
use token::{Token, TokenKind};

/// Parse the token stream of a scanner into a module AST.
pub fn parse(scanner: &Scanner) -> ParseResult<Node<ast::Module>> {
    let tokens = scanner.scan()?;
    let mut par = Parser::new(tokens, scanner.source_name());
    grammar::module::parse_module(&mut par)
}

/// A token cursor shared by the grammar functions.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source_name: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source_name: impl Into<String>) -> Self {
        Self {
            tokens,
            pos: 0,
            source_name: source_name.into(),
        }
    }

    pub fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|tok| tok.kind)
    }

    pub fn peek_ahead(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|tok| tok.kind)
    }

    pub fn next(&mut self) -> ParseResult<Token> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(self.error(self.end_span(), "unexpected end of source")),
        }
    }

    /// Consume the next token, failing with a contextual message if it is
    /// not of the expected kind.
    pub fn expect(&mut self, kind: TokenKind, context: &str) -> ParseResult<Token> {
        match self.peek() {
            Some(found) if found == kind => self.next(),
            Some(found) => {
                let span = self.tokens[self.pos].span;
                Err(self.error(
                    span,
                    format!(
                        "failed to parse {}: expected {}, found {}",
                        context,
                        kind.describe(),
                        found.describe()
                    ),
                ))
            }
            None => Err(self.error(
                self.end_span(),
                format!("failed to parse {}: expected {}", context, kind.describe()),
            )),
        }
    }

    /// Consume the next token if it is of the given kind.
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek() == Some(kind) {
            self.next().ok()
        } else {
            None
        }
    }

    /// Collect a run of leading doc comment tokens into one doc string.
    pub fn eat_docs(&mut self) -> Option<String> {
        let mut lines = vec![];
        while self.peek() == Some(TokenKind::DocComment) {
            lines.push(self.next().expect("peeked").text);
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    pub fn error(&self, span: Span, message: impl Into<String>) -> ParseError {
        ParseError::new(message, SourceLocation::new(span, self.source_name.clone()))
    }

    fn end_span(&self) -> Span {
        let end = self.tokens.last().map(|tok| tok.span.end).unwrap_or(0);
        Span::new(end, end)
    }
}
