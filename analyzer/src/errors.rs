//! Semantic errors.

use pact_common::SourceLocation;
use std::fmt;

/// Error to be returned from APIs that should reject duplicate definitions.
#[derive(Debug)]
pub struct AlreadyDefined;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A name clash, unknown base contract, or other declaration-level
    /// failure.
    DeclarationError,
    /// An operator, assignment, call, override or visibility violation.
    TypeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::DeclarationError => write!(f, "DeclarationError"),
            ErrorKind::TypeError => write!(f, "TypeError"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl SemanticError {
    pub fn type_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind: ErrorKind::TypeError,
            message: message.into(),
            location,
        }
    }

    pub fn declaration_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind: ErrorKind::DeclarationError,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (in \"{}\" at {}..{})",
            self.kind,
            self.message,
            self.location.source,
            self.location.span.start,
            self.location.span.end
        )
    }
}

impl std::error::Error for SemanticError {}

pub type AnalyzerResult<T> = Result<T, SemanticError>;
