//! Deterministic name generation for the IR.

use pact_analyzer::namespace::types::Type;
use pact_parser::ast;
use pact_parser::node::{Node, NodeId};

/// The IR function name for a contract function. The ascending numeric node
/// id keeps names unique across the inheritance hierarchy.
pub fn function_name(func: &Node<ast::Function>) -> String {
    format!("fun_{}_{}", func.kind.name_str(), func.id.index())
}

/// The ABI-decoding wrapper generated for each public function.
pub fn external_function_name(name: &str, id: NodeId) -> String {
    format!("external_fun_{}_{}", name, id.index())
}

/// The internal dispatch routine for a given arity.
pub fn dispatch_name(params: usize, returns: usize) -> String {
    format!("dispatch_internal_in_{}_out_{}", params, returns)
}

/// A safe IR name for a user-declared variable.
pub fn var_name(name: &str) -> String {
    format!("${}", name)
}

/// The name of the runtime sub-object of a contract.
pub fn runtime_object_name(contract: &str) -> String {
    format!("{}_deployed", contract)
}

pub fn checked_op_name(op: &str) -> String {
    format!("checked_{}_u256", op)
}

pub fn panic_name(code: usize) -> String {
    format!("panic_error_0x{:02x}", code)
}

pub fn cleanup_name(typ: &Type) -> String {
    format!("cleanup_{}", type_suffix(typ))
}

pub fn abi_decode_name(typ: &Type) -> String {
    format!("abi_decode_{}", type_suffix(typ))
}

pub fn abi_encode_name(typ: &Type) -> String {
    format!("abi_encode_{}", type_suffix(typ))
}

pub fn read_storage_name(typ: &Type, byte_offset: u32) -> String {
    format!("read_storage_offset_{}_{}", byte_offset, type_suffix(typ))
}

pub fn update_storage_name(typ: &Type, byte_offset: u32) -> String {
    format!("update_storage_offset_{}_{}", byte_offset, type_suffix(typ))
}

fn type_suffix(typ: &Type) -> String {
    match typ {
        Type::Uint => "u256".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Address | Type::Contract(_) => "address".to_string(),
        Type::Bytes(len) => format!("bytes{}", len),
        Type::Function(_) => "fnptr".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::dispatch_name;
    use pact_analyzer::namespace::types::Type;

    #[test]
    fn dispatch_names() {
        assert_eq!(dispatch_name(2, 1), "dispatch_internal_in_2_out_1");
    }

    #[test]
    fn storage_names() {
        assert_eq!(
            super::read_storage_name(&Type::Bool, 20),
            "read_storage_offset_20_bool"
        );
        assert_eq!(super::cleanup_name(&Type::Bytes(4)), "cleanup_bytes4");
    }
}
