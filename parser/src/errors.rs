use pact_common::SourceLocation;
use std::fmt;

/// A parser-level failure: malformed tokens, unexpected syntax, or a missing
/// import target. Carries the location the parser was looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParserError: {} (in \"{}\" at {}..{})",
            self.message, self.location.source, self.location.span.start, self.location.span.end
        )
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;
