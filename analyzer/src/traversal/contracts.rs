use super::functions::resolve_bodies;
use super::types::resolve_type_desc;
use crate::context::{AnalysisContext, ContractAttributes, GlobalContext};
use crate::errors::{AnalyzerResult, SemanticError};
use crate::namespace::types::{assign_storage_layout, FunctionSig, StateVarInfo, Type};
use pact_common::SourceLocation;
use pact_parser::ast;
use pact_parser::node::{Node, NodeId};
use std::collections::BTreeMap;

/// All contract definitions reachable through the topological source order,
/// with the name of the source each one appears in.
pub type ContractAsts<'a> = BTreeMap<String, (&'a Node<ast::Contract>, &'a str)>;

/// Resolution pass for one contract: linearize its inheritance, resolve all
/// member types, assign the storage layout, and bind every name used in its
/// function bodies.
///
/// The driver sets the contract as the global context's current contract
/// before calling this.
pub fn resolve_contract(
    global: &GlobalContext,
    context: &mut AnalysisContext,
    contract: &Node<ast::Contract>,
    asts: &ContractAsts<'_>,
    source: &str,
) -> AnalyzerResult<()> {
    let linearized = linearize(contract, asts, source)?;

    // members of the whole hierarchy, base-most first
    let mut variables: Vec<StateVarInfo> = vec![];
    let mut functions: BTreeMap<String, FunctionSig> = BTreeMap::new();
    let mut own_functions: Vec<FunctionSig> = vec![];
    let mut constructors: Vec<NodeId> = vec![];

    for (base_id, base_name) in linearized.iter().rev() {
        let (base_ast, base_source) = asts
            .get(base_name)
            .expect("linearized contract has no AST");
        debug_assert_eq!(*base_id, base_ast.id);

        for var in base_ast.kind.variables() {
            let typ = resolve_type_desc(global, &var.kind.typ, base_source)?;
            if var.kind.immutable && !is_immutable_type(&typ) {
                return Err(SemanticError::type_error(
                    format!("type `{}` cannot be immutable", typ),
                    SourceLocation::new(var.kind.typ.span, *base_source),
                ));
            }
            if variables.iter().any(|known| known.name == var.kind.name.kind) {
                return Err(SemanticError::declaration_error(
                    format!(
                        "state variable `{}` already declared in a base contract",
                        var.kind.name.kind
                    ),
                    SourceLocation::new(var.kind.name.span, *base_source),
                ));
            }
            variables.push(StateVarInfo {
                id: var.id,
                name: var.kind.name.kind.clone(),
                typ,
                immutable: var.kind.immutable,
                slot: 0,
                byte_offset: 0,
                defined_in: base_name.clone(),
            });
        }

        for func in base_ast.kind.functions() {
            if func.kind.is_constructor() {
                if !std::ptr::eq(*base_ast, contract) && !func.kind.params.is_empty() {
                    return Err(SemanticError::type_error(
                        "base contract constructors with parameters are not supported",
                        SourceLocation::new(contract.kind.name.span, source),
                    ));
                }
                constructors.push(func.id);
                continue;
            }
            let sig = function_sig(global, func, base_name, base_source)?;
            functions.insert(sig.name.clone(), sig);
        }
    }

    assign_storage_layout(&mut variables);

    // attribute this contract's own definitions
    for func in contract.kind.functions() {
        if func.kind.is_constructor() {
            if !func.kind.returns.is_empty() {
                return Err(SemanticError::type_error(
                    "constructors cannot return values",
                    SourceLocation::new(func.span, source),
                ));
            }
        }
        let sig = function_sig(global, func, &contract.kind.name.kind, source)?;
        for (param, (_, typ)) in func.kind.params.iter().zip(sig.params.iter()) {
            context.add_declaration(param.id, typ.clone());
        }
        if !func.kind.is_constructor() {
            own_functions.push(sig.clone());
        }
        context.add_function(func.id, sig);
    }

    let fully_implemented = functions.values().all(|sig| sig.has_body);

    let attributes = ContractAttributes {
        id: contract.id,
        name: contract.kind.name.kind.clone(),
        doc: contract.kind.doc.clone(),
        linearized,
        functions,
        own_functions,
        variables,
        constructors,
        created_contracts: Default::default(),
        fully_implemented,
    };
    context.add_contract(contract.id, attributes.clone());

    resolve_bodies(global, context, &attributes, contract, source)
}

/// Depth-first linearization, most-derived first, duplicates removed on
/// revisit. Inheritance cycles are an error, not tolerated like import
/// cycles.
fn linearize(
    contract: &Node<ast::Contract>,
    asts: &ContractAsts<'_>,
    source: &str,
) -> AnalyzerResult<Vec<(NodeId, String)>> {
    let mut out: Vec<(NodeId, String)> = vec![];
    let mut path: Vec<String> = vec![];
    visit(contract, asts, source, &mut out, &mut path)?;
    return Ok(out);

    fn visit(
        contract: &Node<ast::Contract>,
        asts: &ContractAsts<'_>,
        source: &str,
        out: &mut Vec<(NodeId, String)>,
        path: &mut Vec<String>,
    ) -> AnalyzerResult<()> {
        let name = &contract.kind.name.kind;
        if path.iter().any(|seen| seen == name) {
            return Err(SemanticError::declaration_error(
                format!("circular inheritance involving `{}`", name),
                SourceLocation::new(contract.kind.name.span, source),
            ));
        }
        if out.iter().any(|(_, seen)| seen == name) {
            return Ok(());
        }
        out.push((contract.id, name.clone()));
        path.push(name.clone());
        for base in &contract.kind.bases {
            match asts.get(&base.kind) {
                Some((base_ast, base_source)) => {
                    visit(base_ast, asts, base_source, out, path)?;
                }
                None => {
                    return Err(SemanticError::declaration_error(
                        format!("unknown base contract `{}`", base.kind),
                        SourceLocation::new(base.span, source),
                    ));
                }
            }
        }
        path.pop();
        Ok(())
    }
}

/// Resolve a function definition's signature. This is a pure function of
/// the AST and the global declarations, so base signatures can be computed
/// before their own contract has been resolved.
fn function_sig(
    global: &GlobalContext,
    func: &Node<ast::Function>,
    defined_in: &str,
    source: &str,
) -> AnalyzerResult<FunctionSig> {
    let mut params = vec![];
    for param in &func.kind.params {
        let typ = resolve_type_desc(global, &param.kind.typ, source)?;
        if params.iter().any(|(name, _): &(String, Type)| name == &param.kind.name.kind) {
            return Err(SemanticError::declaration_error(
                format!("parameter `{}` already declared", param.kind.name.kind),
                SourceLocation::new(param.kind.name.span, source),
            ));
        }
        params.push((param.kind.name.kind.clone(), typ));
    }

    let returns = func
        .kind
        .returns
        .iter()
        .map(|ret| resolve_type_desc(global, ret, source))
        .collect::<AnalyzerResult<Vec<_>>>()?;
    if returns.len() > 1 {
        return Err(SemanticError::type_error(
            "multiple return values are not yet supported",
            SourceLocation::new(func.span, source),
        ));
    }

    Ok(FunctionSig {
        id: func.id,
        name: func.kind.name_str().to_string(),
        params,
        returns,
        visibility: func.kind.visibility,
        has_body: func.kind.body.is_some(),
        defined_in: defined_in.to_string(),
    })
}

fn is_immutable_type(typ: &Type) -> bool {
    matches!(
        typ,
        Type::Uint | Type::Bool | Type::Address | Type::Bytes(_)
    )
}
