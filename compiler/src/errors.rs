//! Errors surfaced by the compilation driver.
//!
//! Invariant violations (dequeuing from an empty work queue, storage lookups
//! for unknown variables, double consumption of one-shot state) are bugs in
//! the compiler itself and panic instead; the offending methods carry
//! `# Panics` sections.

use pact_analyzer::SemanticError;
use pact_parser::ParseError;
use std::fmt;

#[derive(Debug)]
pub enum CompileError {
    /// Malformed input or a missing import target.
    Parser(ParseError),
    /// A declaration or type failure from the resolver.
    Semantic(SemanticError),
    /// Driver misuse: querying before a successful parse, or requesting an
    /// unknown contract or source.
    Compiler(String),
}

impl CompileError {
    pub fn compiler(message: impl Into<String>) -> Self {
        Self::Compiler(message.into())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parser(err) => write!(f, "{}", err),
            CompileError::Semantic(err) => write!(f, "{}", err),
            CompileError::Compiler(message) => write!(f, "CompilerError: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parser(err)
    }
}

impl From<SemanticError> for CompileError {
    fn from(err: SemanticError) -> Self {
        CompileError::Semantic(err)
    }
}

impl From<serde_json::Error> for CompileError {
    fn from(err: serde_json::Error) -> Self {
        CompileError::Compiler(format!("JSON serialization failed: {}", err))
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
