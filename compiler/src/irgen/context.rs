//! Contextual state for lowering one contract to IR.

use super::functions::{AbiFunctions, FunctionCollector, UtilFunctions};
use super::names;
use crate::constants::ERROR_SELECTOR;
use crate::ir::{Expression, Statement};
use indexmap::IndexSet;
use pact_analyzer::namespace::scopes::Shared;
use pact_parser::ast;
use pact_parser::node::{Node, NodeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// How revert reasons are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevertStrings {
    /// No reason strings in the generated code.
    #[default]
    Strip,
    /// Store a reason string before reverting.
    Debug,
}

/// The `(input count, output count)` pair characterizing a function
/// signature at the IR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Arity {
    pub inputs: usize,
    pub outputs: usize,
}

impl Arity {
    pub fn of(func: &ast::Function) -> Self {
        Self {
            inputs: func.params.len(),
            outputs: func.returns.len(),
        }
    }
}

/// Dispatch targets for one arity, ordered by ascending function id with
/// the null default first (`None` orders before every `Some`).
pub type DispatchSet = BTreeSet<Option<NodeId>>;

/// Arity to candidate targets. A key with an empty target set records that
/// a call through a pointer of that arity exists even when no function was
/// ever assigned to one; the call traps at runtime but must compile.
pub type InternalDispatchMap = BTreeMap<Arity, DispatchSet>;

/// The name of an IR-level variable a local has been lowered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrVariable {
    pub name: String,
}

/// State threaded through the lowering of one contract: the function work
/// queue, variable tables, the internal dispatch map and the shared
/// utility-function collector.
pub struct IrContext<'a> {
    revert_strings: RevertStrings,
    /// The contract currently being compiled (the most derived one).
    most_derived: Option<(NodeId, String)>,
    /// Functions awaiting lowering, ordered by ascending id. Filled lazily:
    /// new entries appear while lowered ones are drained.
    function_queue: BTreeSet<NodeId>,
    /// Definitions behind queue entries and dispatch targets.
    queued_defs: BTreeMap<NodeId, &'a Node<ast::Function>>,
    local_variables: BTreeMap<NodeId, IrVariable>,
    /// Memory offsets reserved for immutable values during construction.
    /// Empty in the runtime context.
    immutable_variables: BTreeMap<NodeId, usize>,
    /// Total reserved memory; `None` once consumed.
    reserved_memory: Option<usize>,
    state_variables: BTreeMap<NodeId, (u64, u32)>,
    functions: Shared<FunctionCollector>,
    var_counter: usize,
    internal_dispatch: InternalDispatchMap,
    sub_objects: IndexSet<String>,
    inline_assembly_seen: bool,
}

impl<'a> IrContext<'a> {
    pub fn new(revert_strings: RevertStrings) -> Self {
        Self {
            revert_strings,
            most_derived: None,
            function_queue: BTreeSet::new(),
            queued_defs: BTreeMap::new(),
            local_variables: BTreeMap::new(),
            immutable_variables: BTreeMap::new(),
            reserved_memory: Some(0),
            state_variables: BTreeMap::new(),
            functions: Rc::new(RefCell::new(FunctionCollector::default())),
            var_counter: 0,
            internal_dispatch: InternalDispatchMap::new(),
            sub_objects: IndexSet::new(),
            inline_assembly_seen: false,
        }
    }

    pub fn function_collector(&self) -> Shared<FunctionCollector> {
        Rc::clone(&self.functions)
    }

    pub fn set_most_derived_contract(&mut self, id: NodeId, name: &str) {
        self.most_derived = Some((id, name.to_string()));
    }

    /// The contract currently being compiled.
    ///
    /// # Panics
    ///
    /// Panics if no contract was set.
    pub fn most_derived_contract(&self) -> (NodeId, &str) {
        let (id, name) = self
            .most_derived
            .as_ref()
            .expect("no contract is being compiled");
        (*id, name)
    }

    /// Adds a function to the code generation queue and returns the name of
    /// the corresponding IR function. Idempotent on duplicates.
    pub fn enqueue_function_for_code_generation(&mut self, func: &'a Node<ast::Function>) -> String {
        self.function_queue.insert(func.id);
        self.queued_defs.insert(func.id, func);
        names::function_name(func)
    }

    /// Pops the smallest-id function from the generation queue.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty.
    pub fn dequeue_function_for_code_generation(&mut self) -> &'a Node<ast::Function> {
        let id = *self
            .function_queue
            .iter()
            .next()
            .expect("function generation queue is empty");
        self.function_queue.remove(&id);
        self.queued_defs[&id]
    }

    pub fn function_generation_queue_empty(&self) -> bool {
        self.function_queue.is_empty()
    }

    /// The definition behind a previously enqueued function id.
    ///
    /// # Panics
    ///
    /// Panics if the id was never enqueued or added to the dispatch.
    pub fn queued_definition(&self, id: NodeId) -> &'a Node<ast::Function> {
        self.queued_defs[&id]
    }

    /// Register a local (or parameter) and hand out its IR variable.
    ///
    /// # Panics
    ///
    /// Panics if the declaration was already added.
    pub fn add_local_variable(&mut self, decl: &Node<ast::VariableDeclaration>) -> IrVariable {
        let var = IrVariable {
            name: names::var_name(&decl.kind.name.kind),
        };
        let previous = self.local_variables.insert(decl.id, var.clone());
        assert!(previous.is_none(), "local variable added twice");
        var
    }

    pub fn is_local_variable(&self, decl: NodeId) -> bool {
        self.local_variables.contains_key(&decl)
    }

    /// The IR variable of a registered local.
    ///
    /// # Panics
    ///
    /// Panics if the declaration was never added.
    pub fn local_variable(&self, decl: NodeId) -> &IrVariable {
        self.local_variables
            .get(&decl)
            .expect("unknown local variable")
    }

    /// Registers an immutable variable of the contract, reserving a fresh
    /// memory slot for its value. Should only be called at construction
    /// time.
    ///
    /// # Panics
    ///
    /// Panics if reserved memory was already consumed, or the variable was
    /// already registered.
    pub fn register_immutable_variable(&mut self, decl: NodeId) {
        let reserved = self
            .reserved_memory
            .as_mut()
            .expect("immutable variables must be registered before memory is reserved");
        let offset = *reserved;
        *reserved += 32;
        let previous = self.immutable_variables.insert(decl, offset);
        assert!(previous.is_none(), "immutable variable registered twice");
    }

    /// The reserved memory offset holding the given immutable during
    /// construction.
    ///
    /// # Panics
    ///
    /// Panics if the variable was never registered.
    pub fn immutable_memory_offset(&self, decl: NodeId) -> usize {
        *self
            .immutable_variables
            .get(&decl)
            .expect("unknown immutable variable")
    }

    /// The ordinal of an immutable inside the trailing code data segment.
    pub fn immutable_index(&self, decl: NodeId) -> usize {
        self.immutable_memory_offset(decl) / 32
    }

    pub fn immutable_count(&self) -> usize {
        self.immutable_variables.len()
    }

    /// Returns the total reserved memory and consumes it. Used exactly once,
    /// to initialize the free memory pointer past the immutables area.
    ///
    /// # Panics
    ///
    /// Panics on the second call.
    pub fn reserved_memory(&mut self) -> usize {
        self.reserved_memory
            .take()
            .expect("reserved memory was already consumed")
    }

    pub fn add_state_variable(&mut self, decl: NodeId, slot: u64, byte_offset: u32) {
        self.state_variables.insert(decl, (slot, byte_offset));
    }

    pub fn is_state_variable(&self, decl: NodeId) -> bool {
        self.state_variables.contains_key(&decl)
    }

    /// Storage slot and intra-slot byte offset of a state variable.
    ///
    /// # Panics
    ///
    /// Panics if the declaration is not a registered state variable.
    pub fn storage_location_of_state_variable(&self, decl: NodeId) -> (u64, u32) {
        *self
            .state_variables
            .get(&decl)
            .expect("storage lookup for a variable that is not a state variable")
    }

    /// A fresh, unique IR variable name.
    pub fn new_ir_variable(&mut self) -> String {
        self.make_unique_name("t")
    }

    /// Makes a unique name from the given one, keeping it readable. The
    /// underscore prefix keeps generated names apart from user variables,
    /// which lower with a `$` prefix.
    pub fn make_unique_name(&mut self, name: &str) -> String {
        let id = self.var_counter;
        self.var_counter += 1;
        format!("_{}_{}", name, id)
    }

    /// One-shot initialization of the internal dispatch map.
    ///
    /// # Panics
    ///
    /// Panics if the map already has entries.
    pub fn initialize_internal_dispatch(&mut self, map: InternalDispatchMap) {
        assert!(
            self.internal_dispatch.is_empty(),
            "internal dispatch map initialized twice"
        );
        for (arity, targets) in &map {
            for target in targets.iter().flatten() {
                debug_assert!(
                    self.queued_defs.contains_key(target),
                    "dispatch target {:?} for arity {:?} has no known definition",
                    target,
                    arity
                );
            }
        }
        self.internal_dispatch = map;
    }

    /// Takes the accumulated dispatch map, leaving it clean.
    pub fn consume_internal_dispatch_map(&mut self) -> InternalDispatchMap {
        std::mem::take(&mut self.internal_dispatch)
    }

    pub fn internal_dispatch_clean(&self) -> bool {
        self.internal_dispatch.is_empty()
    }

    /// Records that a call through a function pointer of this arity exists,
    /// even if no candidate target does.
    pub fn internal_function_called_through_dispatch(&mut self, arity: Arity) {
        self.internal_dispatch.entry(arity).or_default();
    }

    /// Adds a function to the internal dispatch and queues it for code
    /// generation.
    pub fn add_to_internal_dispatch(&mut self, func: &'a Node<ast::Function>) {
        self.internal_dispatch
            .entry(Arity::of(&func.kind))
            .or_default()
            .insert(Some(func.id));
        self.enqueue_function_for_code_generation(func);
    }

    /// A utility-function generator backed by this context's collector, so
    /// helpers requested through different generators are deduplicated.
    pub fn utils(&self) -> UtilFunctions {
        UtilFunctions::new(Rc::clone(&self.functions))
    }

    /// An ABI coder backed by the same collector.
    pub fn abi_functions(&self) -> AbiFunctions {
        AbiFunctions::new(Rc::clone(&self.functions))
    }

    pub fn revert_strings(&self) -> RevertStrings {
        self.revert_strings
    }

    /// IR that stores `message` as an `Error(string)` payload and reverts
    /// with it, iff the revert-string mode is debug. Empty otherwise.
    pub fn revert_reason_if_debug(&self, message: &str) -> Vec<Statement> {
        if self.revert_strings != RevertStrings::Debug || message.is_empty() {
            return vec![];
        }
        let bytes = message.as_bytes();
        let mut stmts = vec![
            Statement::Expression(Expression::call(
                "mstore",
                vec![
                    Expression::dec(0),
                    Expression::call(
                        "shl",
                        vec![Expression::dec(224), Expression::lit(ERROR_SELECTOR)],
                    ),
                ],
            )),
            Statement::Expression(Expression::call(
                "mstore",
                vec![Expression::dec(4), Expression::dec(32)],
            )),
            Statement::Expression(Expression::call(
                "mstore",
                vec![Expression::dec(36), Expression::dec(bytes.len())],
            )),
        ];
        for (idx, chunk) in bytes.chunks(32).enumerate() {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            stmts.push(Statement::Expression(Expression::call(
                "mstore",
                vec![
                    Expression::dec(68 + idx * 32),
                    Expression::lit(format!("0x{}", hex_word(&word))),
                ],
            )));
        }
        let padded = (bytes.len() + 31) / 32 * 32;
        stmts.push(Statement::Expression(Expression::call(
            "revert",
            vec![Expression::dec(0), Expression::dec(68 + padded)],
        )));
        stmts
    }

    /// Contracts instantiated with `new` while lowering; drives nested
    /// sub-object emission.
    pub fn sub_objects_created(&mut self) -> &mut IndexSet<String> {
        &mut self.sub_objects
    }

    pub fn sub_objects(&self) -> &IndexSet<String> {
        &self.sub_objects
    }

    pub fn set_inline_assembly_seen(&mut self) {
        self.inline_assembly_seen = true;
    }

    pub fn inline_assembly_seen(&self) -> bool {
        self.inline_assembly_seen
    }
}

fn hex_word(word: &[u8; 32]) -> String {
    word.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::{Arity, IrContext, RevertStrings};
    use pact_parser::ast::{Function, Visibility};
    use pact_parser::node::{Node, NodeId};
    use pact_common::Span;

    fn dummy_fn(name: &str) -> Node<Function> {
        Node::new(
            Function {
                name: Some(Node::new(name.to_string(), Span::empty())),
                params: vec![],
                returns: vec![],
                visibility: Visibility::Internal,
                body: Some(vec![]),
                doc: None,
            },
            Span::empty(),
        )
    }

    #[test]
    fn queue_is_ordered_and_idempotent() {
        let first = dummy_fn("a");
        let second = dummy_fn("b");
        let mut ctx = IrContext::new(RevertStrings::Strip);

        ctx.enqueue_function_for_code_generation(&second);
        ctx.enqueue_function_for_code_generation(&first);
        ctx.enqueue_function_for_code_generation(&second);

        assert_eq!(ctx.dequeue_function_for_code_generation().id, first.id);
        assert_eq!(ctx.dequeue_function_for_code_generation().id, second.id);
        assert!(ctx.function_generation_queue_empty());
    }

    #[test]
    #[should_panic(expected = "queue is empty")]
    fn dequeue_empty_queue_panics() {
        let mut ctx = IrContext::new(RevertStrings::Strip);
        ctx.dequeue_function_for_code_generation();
    }

    #[test]
    fn reserved_memory_is_one_shot() {
        let mut ctx = IrContext::new(RevertStrings::Strip);
        ctx.register_immutable_variable(NodeId::fresh());
        ctx.register_immutable_variable(NodeId::fresh());
        assert_eq!(ctx.reserved_memory(), 64);
    }

    #[test]
    #[should_panic(expected = "already consumed")]
    fn reserved_memory_consumed_twice_panics() {
        let mut ctx = IrContext::new(RevertStrings::Strip);
        ctx.reserved_memory();
        ctx.reserved_memory();
    }

    #[test]
    fn dispatch_map_take_leaves_it_clean() {
        let func = dummy_fn("f");
        let mut ctx = IrContext::new(RevertStrings::Strip);
        ctx.add_to_internal_dispatch(&func);
        ctx.internal_function_called_through_dispatch(Arity {
            inputs: 2,
            outputs: 0,
        });

        let map = ctx.consume_internal_dispatch_map();
        assert_eq!(map.len(), 2);
        // the empty entry for the pointer call site is meaningful
        assert!(map[&Arity {
            inputs: 2,
            outputs: 0
        }]
        .is_empty());
        assert!(ctx.internal_dispatch_clean());
        assert!(ctx.consume_internal_dispatch_map().is_empty());
    }

    #[test]
    fn dispatch_map_initialization_is_one_shot() {
        let func = dummy_fn("f");
        let mut ctx = IrContext::new(RevertStrings::Strip);
        ctx.enqueue_function_for_code_generation(&func);

        let mut map = super::InternalDispatchMap::new();
        map.entry(Arity {
            inputs: 0,
            outputs: 0,
        })
        .or_default()
        .insert(Some(func.id));
        ctx.initialize_internal_dispatch(map);
        assert!(!ctx.internal_dispatch_clean());
        assert_eq!(ctx.consume_internal_dispatch_map().len(), 1);
        assert!(ctx.internal_dispatch_clean());
    }

    #[test]
    #[should_panic(expected = "initialized twice")]
    fn dispatch_map_double_initialization_panics() {
        let mut ctx = IrContext::new(RevertStrings::Strip);
        let mut map = super::InternalDispatchMap::new();
        map.entry(Arity {
            inputs: 1,
            outputs: 0,
        })
        .or_default();
        ctx.initialize_internal_dispatch(map.clone());
        ctx.initialize_internal_dispatch(map);
    }

    #[test]
    fn nulls_order_first_in_dispatch_sets() {
        let mut set = super::DispatchSet::new();
        set.insert(Some(NodeId::fresh()));
        set.insert(None);
        assert_eq!(set.iter().next(), Some(&None));
    }

    #[test]
    fn debug_revert_reason() {
        let ctx = IrContext::new(RevertStrings::Debug);
        assert_eq!(ctx.revert_reason_if_debug("").len(), 0);
        let stmts = ctx.revert_reason_if_debug("bad input");
        // selector, offset, length, one data word, revert
        assert_eq!(stmts.len(), 5);

        let stripped = IrContext::new(RevertStrings::Strip);
        assert!(stripped.revert_reason_if_debug("bad input").is_empty());
    }
}
