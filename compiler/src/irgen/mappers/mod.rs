pub mod contracts;
pub mod expressions;
pub mod functions;
