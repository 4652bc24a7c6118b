pub mod contracts;
pub mod expressions;
pub mod functions;
pub mod module;
pub mod types;
