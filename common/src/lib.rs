pub mod diagnostics;
pub mod numeric;
pub mod span;
pub mod utils;

pub use span::{SourceLocation, Span};
