use crate::context::{Declaration, GlobalContext};
use crate::errors::{AnalyzerResult, SemanticError};
use crate::namespace::types::{self, ContractType, FunctionType, Type};
use pact_common::SourceLocation;
use pact_parser::ast::TypeDesc;
use pact_parser::node::Node;

/// Resolve a type description to a type. Names that are not elementary
/// types must refer to a registered contract.
pub fn resolve_type_desc(
    global: &GlobalContext,
    desc: &Node<TypeDesc>,
    source: &str,
) -> AnalyzerResult<Type> {
    match &desc.kind {
        TypeDesc::Base { base } => {
            if let Some(typ) = types::from_base_name(base) {
                return Ok(typ);
            }
            match global.resolve(base) {
                Some(Declaration::Contract { id, name }) => Ok(Type::Contract(ContractType {
                    id: *id,
                    name: name.clone(),
                })),
                _ => Err(SemanticError::type_error(
                    format!("unknown type `{}`", base),
                    SourceLocation::new(desc.span, source),
                )),
            }
        }
        TypeDesc::Function { params, returns } => {
            let params = params
                .iter()
                .map(|param| resolve_type_desc(global, param, source))
                .collect::<AnalyzerResult<Vec<_>>>()?;
            let returns = returns
                .iter()
                .map(|ret| resolve_type_desc(global, ret, source))
                .collect::<AnalyzerResult<Vec<_>>>()?;
            Ok(Type::Function(FunctionType { params, returns }))
        }
    }
}
