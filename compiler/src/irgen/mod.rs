pub mod context;
pub mod functions;
pub mod mappers;
pub mod names;

pub use context::{Arity, InternalDispatchMap, IrContext, RevertStrings};
