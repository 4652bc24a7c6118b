use pact_parser::ast;
use pact_parser::node::NodeId;
use std::fmt;

/// A resolved pact type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The 256-bit unsigned word type (`uint` / `uint256`).
    Uint,
    Bool,
    Address,
    /// `bytes1` .. `bytes32`.
    Bytes(u8),
    Contract(ContractType),
    Function(FunctionType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractType {
    pub id: NodeId,
    pub name: String,
}

/// An internal function type; the `(input count, output count)` pair is the
/// arity used by the code generator's dispatch tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
}

impl Type {
    /// The packed byte width used by the storage layouter.
    pub fn size_bytes(&self) -> usize {
        match self {
            Type::Uint => 32,
            Type::Bool => 1,
            Type::Address => 20,
            Type::Bytes(len) => *len as usize,
            Type::Contract(_) => 20,
            // an internal function id occupies a full word
            Type::Function(_) => 32,
        }
    }

    /// The canonical name used in ABI signatures and descriptors.
    ///
    /// Contract values surface as plain addresses in the external
    /// interface; internal function types have no ABI name and are kept
    /// out of public signatures by the type checker.
    pub fn abi_name(&self) -> String {
        match self {
            Type::Uint => "uint256".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Address | Type::Contract(_) => "address".to_string(),
            Type::Bytes(len) => format!("bytes{}", len),
            Type::Function(_) => "function".to_string(),
        }
    }

    /// Whether a value of type `other` is acceptable where `self` is
    /// expected without an explicit conversion.
    pub fn assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Address, Type::Contract(_)) => true,
            (Type::Contract(left), Type::Contract(right)) => left.id == right.id,
            (left, right) => left == right,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Uint => write!(f, "uint256"),
            Type::Bool => write!(f, "bool"),
            Type::Address => write!(f, "address"),
            Type::Bytes(len) => write!(f, "bytes{}", len),
            Type::Contract(contract) => write!(f, "{}", contract.name),
            Type::Function(typ) => {
                write!(f, "function(")?;
                for (idx, param) in typ.params.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")?;
                if !typ.returns.is_empty() {
                    write!(f, " returns (")?;
                    for (idx, ret) in typ.returns.iter().enumerate() {
                        if idx > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", ret)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

/// Interpret a base type name, returning `None` for names that must refer
/// to a contract.
pub fn from_base_name(name: &str) -> Option<Type> {
    match name {
        "uint" | "uint256" => Some(Type::Uint),
        "bool" => Some(Type::Bool),
        "address" => Some(Type::Address),
        _ => {
            let len = name.strip_prefix("bytes")?.parse::<u8>().ok()?;
            if (1..=32).contains(&len) {
                Some(Type::Bytes(len))
            } else {
                None
            }
        }
    }
}

/// Signature of a (possibly inherited) contract function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    pub id: NodeId,
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub returns: Vec<Type>,
    pub visibility: ast::Visibility,
    pub has_body: bool,
    /// Name of the contract the definition appears in.
    pub defined_in: String,
}

impl FunctionSig {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|(_, typ)| typ.clone()).collect()
    }

    /// The canonical selector signature, e.g. `register(bytes32)`.
    pub fn selector_signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(_, typ)| typ.abi_name())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({})", self.name, params)
    }

    pub fn function_type(&self) -> FunctionType {
        FunctionType {
            params: self.param_types(),
            returns: self.returns.clone(),
        }
    }
}

/// A state variable with its resolved storage or reserved-memory placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVarInfo {
    pub id: NodeId,
    pub name: String,
    pub typ: Type,
    pub immutable: bool,
    /// Storage slot; meaningless for immutables.
    pub slot: u64,
    /// Byte offset inside the slot, counted from the least significant byte.
    pub byte_offset: u32,
    pub defined_in: String,
}

/// Assign packed storage slots to the non-immutable variables, in the given
/// declaration order (base-most contract first). Values never straddle a
/// slot boundary.
pub fn assign_storage_layout(vars: &mut [StateVarInfo]) {
    let mut slot = 0u64;
    let mut offset = 0usize;
    for var in vars.iter_mut() {
        if var.immutable {
            continue;
        }
        let size = var.typ.size_bytes();
        if offset + size > 32 {
            slot += 1;
            offset = 0;
        }
        var.slot = slot;
        var.byte_offset = offset as u32;
        offset += size;
        if offset == 32 {
            slot += 1;
            offset = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{assign_storage_layout, from_base_name, StateVarInfo, Type};
    use pact_parser::node::NodeId;

    fn var(name: &str, typ: Type) -> StateVarInfo {
        StateVarInfo {
            id: NodeId::fresh(),
            name: name.to_string(),
            typ,
            immutable: false,
            slot: 0,
            byte_offset: 0,
            defined_in: "C".to_string(),
        }
    }

    #[test]
    fn base_names() {
        assert_eq!(from_base_name("uint"), Some(Type::Uint));
        assert_eq!(from_base_name("bytes32"), Some(Type::Bytes(32)));
        assert_eq!(from_base_name("bytes33"), None);
        assert_eq!(from_base_name("Config"), None);
    }

    #[test]
    fn packing_layout() {
        let mut vars = vec![
            var("a", Type::Address),
            var("b", Type::Bool),
            var("c", Type::Uint),
            var("d", Type::Bytes(4)),
        ];
        assign_storage_layout(&mut vars);
        // address (20) and bool (1) share slot 0; uint needs its own slot
        assert_eq!((vars[0].slot, vars[0].byte_offset), (0, 0));
        assert_eq!((vars[1].slot, vars[1].byte_offset), (0, 20));
        assert_eq!((vars[2].slot, vars[2].byte_offset), (1, 0));
        assert_eq!((vars[3].slot, vars[3].byte_offset), (2, 0));
    }
}
