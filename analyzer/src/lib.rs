//! Semantic analysis for pact: declaration registration, name and type
//! resolution, and type-requirement checking over the contract hierarchy.
//!
//! The compilation driver walks contracts in topological source order and
//! runs the three phases through the functions re-exported here; results
//! accumulate in an [`context::AnalysisContext`] keyed by AST node ids.

pub mod builtins;
pub mod context;
pub mod errors;
pub mod namespace;
pub mod traversal;

pub use context::{AnalysisContext, GlobalContext};
pub use errors::{AnalyzerResult, SemanticError};
pub use traversal::contracts::ContractAsts;
