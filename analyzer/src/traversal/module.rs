use crate::context::GlobalContext;
use crate::errors::{AnalyzerResult, SemanticError};
use pact_common::SourceLocation;
use pact_parser::ast::{ContractStmt, Module, ModuleStmt};
use pact_parser::node::Node;
use std::collections::BTreeSet;

/// Names that always resolve in the global scope and may not be redeclared
/// by contract members.
const RESERVED: &[&str] = &[
    "msg",
    "block",
    "this",
    "super",
    "require",
    "revert",
    "selfdestruct",
];

/// Registration pass: enter every contract of a source unit into the global
/// declaration table and apply shadowing rules to its members.
pub fn register_declarations(
    global: &mut GlobalContext,
    module: &Node<Module>,
    source: &str,
) -> AnalyzerResult<()> {
    for stmt in &module.kind.body {
        if let ModuleStmt::Contract(contract) = stmt {
            global.register_contract(
                &contract.kind.name.kind,
                contract.id,
                SourceLocation::new(contract.kind.name.span, source),
            )?;
            check_member_names(global, contract, source)?;
        }
    }
    Ok(())
}

fn check_member_names(
    global: &GlobalContext,
    contract: &Node<pact_parser::ast::Contract>,
    source: &str,
) -> AnalyzerResult<()> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for stmt in &contract.kind.body {
        let name = match stmt {
            ContractStmt::Variable(var) => &var.kind.name,
            ContractStmt::Function(func) => match &func.kind.name {
                Some(name) => name,
                // constructors are anonymous; one per contract
                None => continue,
            },
        };
        if !seen.insert(&name.kind) {
            return Err(SemanticError::declaration_error(
                format!("member `{}` already declared", name.kind),
                SourceLocation::new(name.span, source),
            ));
        }
        if RESERVED.contains(&name.kind.as_str()) || global.resolve(&name.kind).is_some() {
            return Err(SemanticError::declaration_error(
                format!("member `{}` shadows a global declaration", name.kind),
                SourceLocation::new(name.span, source),
            ));
        }
    }

    let constructors = contract
        .kind
        .functions()
        .filter(|func| func.kind.is_constructor())
        .count();
    if constructors > 1 {
        return Err(SemanticError::declaration_error(
            "more than one constructor declared",
            SourceLocation::new(contract.kind.name.span, source),
        ));
    }
    Ok(())
}
