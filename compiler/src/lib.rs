//! The pact compilation pipeline: a driver that parses named source
//! units, resolves names and types across the import graph, lowers each
//! contract through a Yul-shaped IR and emits linkable stack-machine
//! bytecode plus interface and documentation artifacts.

pub mod abi;
pub mod asm;
pub mod constants;
pub mod driver;
pub mod errors;
pub mod ir;
pub mod irgen;
pub mod natspec;
pub mod std_sources;

pub use asm::{Assembly, AssemblyItem, LinkerObject};
pub use driver::Driver;
pub use errors::{CompileError, CompileResult};
pub use irgen::RevertStrings;
pub use natspec::DocumentationKind;
