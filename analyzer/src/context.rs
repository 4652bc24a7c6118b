use crate::builtins::{GlobalFunction, Object};
use crate::errors::{AnalyzerResult, SemanticError};
use crate::namespace::types::{FunctionSig, StateVarInfo, Type};
use indexmap::IndexSet;
use pact_common::SourceLocation;
use pact_parser::node::NodeId;
use std::collections::BTreeMap;

/// What a top-level name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Contract { id: NodeId, name: String },
    /// The synthetic `this` declaration, rebound to the contract currently
    /// being resolved.
    This { contract: NodeId },
    /// The synthetic `super` declaration, likewise rebound.
    Super { contract: NodeId },
    Magic(Object),
    GlobalFunction(GlobalFunction),
}

/// Owns the built-in declarations and the movable "current contract" frame
/// used while resolving that contract's members.
///
/// Exactly one contract is current at a time; `set_current_contract`
/// rebinds the synthetic `this` and `super` declarations to it.
pub struct GlobalContext {
    declarations: BTreeMap<String, Declaration>,
    current_contract: Option<(NodeId, String)>,
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalContext {
    pub fn new() -> Self {
        let mut declarations = BTreeMap::new();
        declarations.insert("msg".to_string(), Declaration::Magic(Object::Msg));
        declarations.insert("block".to_string(), Declaration::Magic(Object::Block));
        for (name, func) in [
            ("require", GlobalFunction::Require),
            ("revert", GlobalFunction::Revert),
            ("selfdestruct", GlobalFunction::Selfdestruct),
        ] {
            declarations.insert(name.to_string(), Declaration::GlobalFunction(func));
        }
        Self {
            declarations,
            current_contract: None,
        }
    }

    /// Register a contract under its name.
    pub fn register_contract(
        &mut self,
        name: &str,
        id: NodeId,
        location: SourceLocation,
    ) -> AnalyzerResult<()> {
        if self.declarations.contains_key(name) {
            return Err(SemanticError::declaration_error(
                format!("identifier `{}` already declared", name),
                location,
            ));
        }
        self.declarations.insert(
            name.to_string(),
            Declaration::Contract {
                id,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Make the given contract current and rebind `this`/`super` to it.
    pub fn set_current_contract(&mut self, id: NodeId, name: &str) {
        self.current_contract = Some((id, name.to_string()));
        self.declarations
            .insert("this".to_string(), Declaration::This { contract: id });
        self.declarations
            .insert("super".to_string(), Declaration::Super { contract: id });
    }

    pub fn current_contract(&self) -> Option<(NodeId, &str)> {
        self.current_contract
            .as_ref()
            .map(|(id, name)| (*id, name.as_str()))
    }

    pub fn resolve(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    /// Clears the current-contract frame and all declarations, built-ins
    /// included.
    pub fn reset(&mut self) {
        self.declarations.clear();
        self.current_contract = None;
    }
}

/// Contains contextual information relating to an identifier use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Local(NodeId),
    StateVar(NodeId),
    Function(NodeId),
    ContractRef(NodeId),
    This,
    Super,
    Magic(Object),
    GlobalFunction(GlobalFunction),
    /// An elementary type name in call position (`address(x)`).
    TypeName(Type),
}

/// The kind of a call expression, attributed during type checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallType {
    /// Call of a (possibly inherited) contract function. Binds virtually:
    /// code generation re-resolves the name against the most derived
    /// contract's function table.
    Internal { function: NodeId },
    /// `super.f(...)`: statically bound to a base implementation.
    Super { function: NodeId },
    /// Call through a function-typed value; routed at runtime through the
    /// internal dispatch for this arity.
    ViaPointer { params: usize, returns: usize },
    /// Conversion call such as `address(x)` or `Config(x)`.
    TypeConstructor { typ: Type },
    BuiltinFunction { func: GlobalFunction },
    /// `new C(...)`.
    Create { contract: NodeId },
}

/// Contains contextual information relating to an expression AST node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionAttributes {
    pub typ: Type,
    /// Number literals convert freely to addresses and fixed byte types as
    /// long as they fit; this flag marks them.
    pub literal: bool,
}

impl ExpressionAttributes {
    pub fn new(typ: Type) -> Self {
        Self {
            typ,
            literal: false,
        }
    }

    pub fn literal(typ: Type) -> Self {
        Self { typ, literal: true }
    }
}

/// Contains contextual information relating to a contract AST node,
/// assembled over resolution phases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractAttributes {
    pub id: NodeId,
    pub name: String,
    pub doc: Option<String>,
    /// Linearized hierarchy, most-derived (the contract itself) first.
    pub linearized: Vec<(NodeId, String)>,
    /// Merged function table; a derived definition overrides its base's.
    pub functions: BTreeMap<String, FunctionSig>,
    /// Functions declared in this contract itself, in declaration order
    /// (constructors excluded). Used for override-consistency checks.
    pub own_functions: Vec<FunctionSig>,
    /// Merged state variables, base-most contract first, in declaration
    /// order; storage slots are assigned over this exact order.
    pub variables: Vec<StateVarInfo>,
    /// Constructor definitions, base-most first (execution order).
    pub constructors: Vec<NodeId>,
    /// Contracts instantiated with `new` inside this contract.
    pub created_contracts: IndexSet<String>,
    pub fully_implemented: bool,
}

impl ContractAttributes {
    pub fn variable(&self, name: &str) -> Option<&StateVarInfo> {
        self.variables.iter().find(|var| var.name == name)
    }

    /// Public functions in name order; the external interface of the
    /// contract.
    pub fn public_functions(&self) -> Vec<&FunctionSig> {
        self.functions
            .values()
            .filter(|sig| sig.visibility == pact_parser::ast::Visibility::Public)
            .collect()
    }
}

/// Analysis side tables, keyed by AST node id. `add_*` methods are one-shot;
/// attributing the same node twice is an internal error.
#[derive(Debug, Default)]
pub struct AnalysisContext {
    expressions: BTreeMap<NodeId, ExpressionAttributes>,
    declarations: BTreeMap<NodeId, Type>,
    bindings: BTreeMap<NodeId, Binding>,
    calls: BTreeMap<NodeId, CallType>,
    functions: BTreeMap<NodeId, FunctionSig>,
    contracts: BTreeMap<NodeId, ContractAttributes>,
    contracts_by_name: BTreeMap<String, NodeId>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute type information to an expression node.
    ///
    /// # Panics
    ///
    /// Panics if an entry already exists for the node id.
    pub fn add_expression(&mut self, node: NodeId, attributes: ExpressionAttributes) {
        expect_none(
            self.expressions.insert(node, attributes),
            "expression attributes already exist",
        );
    }

    pub fn get_expression(&self, node: NodeId) -> Option<&ExpressionAttributes> {
        self.expressions.get(&node)
    }

    /// Attribute a resolved type to a variable declaration node.
    ///
    /// # Panics
    ///
    /// Panics if an entry already exists for the node id.
    pub fn add_declaration(&mut self, node: NodeId, typ: Type) {
        expect_none(
            self.declarations.insert(node, typ),
            "declaration attributes already exist",
        );
    }

    pub fn get_declaration(&self, node: NodeId) -> Option<&Type> {
        self.declarations.get(&node)
    }

    /// Attribute a binding to an identifier node.
    ///
    /// # Panics
    ///
    /// Panics if an entry already exists for the node id.
    pub fn add_binding(&mut self, node: NodeId, binding: Binding) {
        expect_none(
            self.bindings.insert(node, binding),
            "binding already exists",
        );
    }

    pub fn get_binding(&self, node: NodeId) -> Option<&Binding> {
        self.bindings.get(&node)
    }

    /// Attribute a call kind to a call expression node.
    ///
    /// # Panics
    ///
    /// Panics if an entry already exists for the node id.
    pub fn add_call(&mut self, node: NodeId, call: CallType) {
        expect_none(self.calls.insert(node, call), "call attributes already exist");
    }

    pub fn get_call(&self, node: NodeId) -> Option<&CallType> {
        self.calls.get(&node)
    }

    /// Attribute a resolved signature to a function definition node.
    ///
    /// # Panics
    ///
    /// Panics if an entry already exists for the node id.
    pub fn add_function(&mut self, node: NodeId, sig: FunctionSig) {
        expect_none(
            self.functions.insert(node, sig),
            "function attributes already exist",
        );
    }

    pub fn get_function(&self, node: NodeId) -> Option<&FunctionSig> {
        self.functions.get(&node)
    }

    /// Attribute resolved information to a contract definition node.
    ///
    /// # Panics
    ///
    /// Panics if an entry already exists for the node id.
    pub fn add_contract(&mut self, node: NodeId, attributes: ContractAttributes) {
        self.contracts_by_name
            .insert(attributes.name.clone(), node);
        expect_none(
            self.contracts.insert(node, attributes),
            "contract attributes already exist",
        );
    }

    pub fn get_contract(&self, node: NodeId) -> Option<&ContractAttributes> {
        self.contracts.get(&node)
    }

    pub fn get_contract_mut(&mut self, node: NodeId) -> Option<&mut ContractAttributes> {
        self.contracts.get_mut(&node)
    }

    pub fn contract_by_name(&self, name: &str) -> Option<&ContractAttributes> {
        self.contracts_by_name
            .get(name)
            .and_then(|id| self.contracts.get(id))
    }
}

fn expect_none<T>(item: Option<T>, msg: &str) {
    if item.is_some() {
        panic!("{}", msg)
    }
}
