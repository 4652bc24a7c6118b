use super::elements::{Constructor, Contract, Function, Param};
use pact_analyzer::context::{AnalysisContext, ContractAttributes};
use pact_analyzer::namespace::types::FunctionSig;

/// Build the ABI descriptor of a resolved contract. Functions appear in
/// name order; inherited public functions are included.
pub fn contract_abi(analysis: &AnalysisContext, attrs: &ContractAttributes) -> Contract {
    // the most-derived constructor carries the deployment arguments
    let constructor = attrs
        .constructors
        .iter()
        .filter_map(|id| analysis.get_function(*id))
        .find(|sig| sig.defined_in == attrs.name)
        .map(|sig| Constructor {
            typ: "constructor".to_string(),
            inputs: params(sig),
        });

    let functions = attrs
        .public_functions()
        .into_iter()
        .map(|sig| Function {
            name: sig.name.clone(),
            typ: "function".to_string(),
            inputs: params(sig),
            outputs: sig
                .returns
                .iter()
                .map(|typ| Param {
                    name: String::new(),
                    typ: typ.abi_name(),
                })
                .collect(),
        })
        .collect();

    Contract {
        constructor,
        functions,
    }
}

fn params(sig: &FunctionSig) -> Vec<Param> {
    sig.params
        .iter()
        .map(|(name, typ)| Param {
            name: name.clone(),
            typ: typ.abi_name(),
        })
        .collect()
}
