//! The compilation driver: owns the source registry, walks the pipeline
//! (parse, import resolution, the three resolver phases, per-contract code
//! generation) and serves all output queries.

use crate::asm::{Assembly, AssemblyItem, ContractCompiler, LinkerObject};
use crate::errors::{CompileError, CompileResult};
use crate::irgen::RevertStrings;
use crate::natspec::{DocumentationKind, InterfaceHandler};
use crate::std_sources::{is_standard_source, STANDARD_SOURCES};
use pact_analyzer::context::ContractAttributes;
use pact_analyzer::traversal::{contracts, functions, module};
use pact_analyzer::{AnalysisContext, ContractAsts, GlobalContext};
use pact_common::utils::hash::keccak256;
use pact_common::SourceLocation;
use pact_parser::ast::{self, ModuleStmt};
use pact_parser::node::{Node, NodeId};
use pact_parser::{ParseError, Scanner};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tracing::debug;

/// A registered source unit.
pub struct Source {
    pub scanner: Scanner,
    pub ast: Option<Node<ast::Module>>,
    pub is_library: bool,
}

impl Source {
    fn new(content: &str, name: &str, is_library: bool) -> Self {
        Self {
            scanner: Scanner::new(content, name),
            ast: None,
            is_library,
        }
    }

    /// Discard derived state, keeping the text.
    fn reset(&mut self) {
        self.scanner.reset();
        self.ast = None;
    }
}

/// Everything the driver keeps per contract.
#[derive(Default)]
pub struct ContractRecord {
    /// Defining source and contract node.
    pub source: String,
    pub id: NodeId,
    pub compiler: Option<ContractCompiler>,
    pub object: LinkerObject,
    pub runtime_object: LinkerObject,
    pub clone_object: LinkerObject,
    user_documentation: Option<String>,
    dev_documentation: Option<String>,
    interface: Option<String>,
    source_interface: Option<String>,
}

/// The pipeline state machine: `Idle -> Parsed -> Compiled`, with
/// `parse_successful` as the only retained error signal.
pub struct Driver {
    sources: BTreeMap<String, Source>,
    source_order: Vec<String>,
    global_context: GlobalContext,
    analysis: AnalysisContext,
    contracts: BTreeMap<String, ContractRecord>,
    parse_successful: bool,
    with_standard_sources: bool,
    revert_strings: RevertStrings,
}

impl Driver {
    pub fn new(add_standard_sources: bool) -> Self {
        let mut driver = Self {
            sources: BTreeMap::new(),
            source_order: vec![],
            global_context: GlobalContext::new(),
            analysis: AnalysisContext::new(),
            contracts: BTreeMap::new(),
            parse_successful: false,
            with_standard_sources: add_standard_sources,
            revert_strings: RevertStrings::default(),
        };
        if add_standard_sources {
            driver.add_standard_sources();
        }
        driver
    }

    pub fn set_revert_strings(&mut self, mode: RevertStrings) {
        self.revert_strings = mode;
    }

    fn add_standard_sources(&mut self) {
        for (name, content) in STANDARD_SOURCES {
            self.sources
                .insert(name.to_string(), Source::new(content, name, true));
        }
    }

    /// Add a source, replacing an existing one of the same name. Returns
    /// whether the name existed before. Derived state of all sources is
    /// discarded; their text is kept.
    pub fn add_source(&mut self, name: &str, content: &str, is_library: bool) -> bool {
        let existed = self.sources.contains_key(name);
        self.reset(true, false);
        self.sources
            .insert(name.to_string(), Source::new(content, name, is_library));
        existed
    }

    /// Replace all sources (the standard bundle excepted, per construction
    /// policy) with a single anonymous one.
    pub fn set_source(&mut self, content: &str) {
        self.reset(false, self.with_standard_sources);
        self.add_source("", content, false);
    }

    /// Clear derived state. With `keep_sources` the source text survives;
    /// otherwise the registry is emptied and the standard bundle
    /// optionally re-added.
    pub fn reset(&mut self, keep_sources: bool, add_standard_sources: bool) {
        debug!(keep_sources, "resetting driver");
        self.parse_successful = false;
        if keep_sources {
            for source in self.sources.values_mut() {
                source.reset();
            }
        } else {
            self.sources.clear();
            if add_standard_sources {
                self.add_standard_sources();
            }
        }
        self.global_context.reset();
        self.analysis = AnalysisContext::new();
        self.source_order.clear();
        self.contracts.clear();
    }

    /// Run the front half of the pipeline: parse every source, resolve the
    /// import graph, then run declaration registration, name/type
    /// resolution and type checking over every contract in topological
    /// order, attaching NatSpec documentation at the end.
    ///
    /// All-or-nothing: any failure leaves `parse_successful` false and
    /// dependent queries rejecting.
    pub fn parse(&mut self) -> CompileResult<()> {
        if self.sources.is_empty() {
            return Err(CompileError::compiler("no input sources given"));
        }
        self.parse_successful = false;
        self.global_context = GlobalContext::new();
        self.analysis = AnalysisContext::new();
        self.contracts.clear();
        self.source_order.clear();

        debug!(sources = self.sources.len(), "parsing");
        for source in self.sources.values_mut() {
            source.scanner.reset();
            source.ast = Some(pact_parser::parse(&source.scanner)?);
        }

        self.source_order = resolve_imports(&self.sources)?;

        // phase A: registration
        for source_name in &self.source_order {
            let ast = self.sources[source_name]
                .ast
                .as_ref()
                .expect("source in topological order has no AST");
            module::register_declarations(&mut self.global_context, ast, source_name)?;
        }

        let asts = build_contract_asts(&self.sources, &self.source_order);

        // phase B: resolve names and types
        for source_name in &self.source_order {
            let ast = self.sources[source_name].ast.as_ref().expect("parsed above");
            for stmt in &ast.kind.body {
                if let ModuleStmt::Contract(contract) = stmt {
                    let name = contract.kind.name.kind.clone();
                    self.global_context.set_current_contract(contract.id, &name);
                    contracts::resolve_contract(
                        &self.global_context,
                        &mut self.analysis,
                        contract,
                        &asts,
                        source_name,
                    )?;
                    self.contracts.insert(
                        name,
                        ContractRecord {
                            source: source_name.clone(),
                            id: contract.id,
                            ..Default::default()
                        },
                    );
                }
            }
        }

        // phase C: check type requirements, then attach documentation
        let handler = InterfaceHandler::new();
        for source_name in &self.source_order {
            let ast = self.sources[source_name].ast.as_ref().expect("parsed above");
            for stmt in &ast.kind.body {
                if let ModuleStmt::Contract(contract) = stmt {
                    let name = contract.kind.name.kind.clone();
                    self.global_context.set_current_contract(contract.id, &name);
                    functions::check_contract(&mut self.analysis, contract, source_name)?;

                    let user = handler.user_documentation(&self.analysis, contract)?;
                    let dev = handler.dev_documentation(&self.analysis, contract)?;
                    let record = self
                        .contracts
                        .get_mut(&name)
                        .expect("contract record created during resolution");
                    record.user_documentation = Some(user);
                    record.dev_documentation = Some(dev);
                }
            }
        }

        self.parse_successful = true;
        Ok(())
    }

    /// Parse a single anonymous source.
    pub fn parse_source(&mut self, content: &str) -> CompileResult<()> {
        self.set_source(content);
        self.parse()
    }

    /// Compile every fully implemented contract in topological order. Each
    /// contract is compiled twice: the primary pass yields deployment and
    /// runtime objects, the clone pass a delegating deployment object.
    pub fn compile(&mut self, optimize: bool, runs: u32) -> CompileResult<()> {
        if !self.parse_successful {
            self.parse()?;
        }

        let asts = build_contract_asts(&self.sources, &self.source_order);
        let contract_names: Vec<String> = self
            .source_order
            .iter()
            .flat_map(|source_name| {
                self.sources[source_name]
                    .ast
                    .as_ref()
                    .expect("parsed")
                    .kind
                    .body
                    .iter()
                    .filter_map(|stmt| match stmt {
                        ModuleStmt::Contract(contract) => {
                            Some(contract.kind.name.kind.clone())
                        }
                        _ => None,
                    })
            })
            .collect();

        let mut compiled_contracts: BTreeMap<String, Assembly> = BTreeMap::new();
        for name in contract_names {
            let attrs = self
                .analysis
                .contract_by_name(&name)
                .expect("contract in source order was not resolved")
                .clone();
            if !attrs.fully_implemented {
                continue;
            }
            debug!(contract = %name, optimize, "compiling contract");

            let mut compiler = ContractCompiler::new(optimize, runs, self.revert_strings);
            compiler.compile_contract(&self.analysis, &asts, &attrs, &compiled_contracts)?;
            compiled_contracts.insert(name.clone(), compiler.assembly().clone());

            let mut clone_compiler = ContractCompiler::new(optimize, runs, self.revert_strings);
            clone_compiler.compile_clone(&attrs, &compiled_contracts)?;

            let record = self
                .contracts
                .get_mut(&name)
                .expect("compiled contract has no record");
            record.object = compiler.assembled_object().clone();
            record.runtime_object = compiler.runtime_object().clone();
            record.clone_object = clone_compiler.assembled_object().clone();
            record.compiler = Some(compiler);
        }
        Ok(())
    }

    /// Parse and compile a single source, returning the deployment object
    /// of the default contract.
    pub fn compile_single(&mut self, content: &str, optimize: bool) -> CompileResult<LinkerObject> {
        self.parse_source(content)?;
        self.compile(optimize, 200)?;
        Ok(self.object("")?.clone())
    }

    /// One-shot compilation on a throwaway driver.
    pub fn static_compile(content: &str, optimize: bool) -> CompileResult<LinkerObject> {
        let mut driver = Driver::new(false);
        driver.compile_single(content, optimize)
    }

    // ---- queries ----

    /// All contract names, alphabetical.
    pub fn contract_names(&self) -> CompileResult<Vec<String>> {
        self.require_parsed()?;
        Ok(self.contracts.keys().cloned().collect())
    }

    /// The topological source order of the last successful parse.
    pub fn source_order(&self) -> CompileResult<&[String]> {
        self.require_parsed()?;
        Ok(&self.source_order)
    }

    pub fn object(&self, contract_name: &str) -> CompileResult<&LinkerObject> {
        Ok(&self.contract(contract_name)?.object)
    }

    pub fn runtime_object(&self, contract_name: &str) -> CompileResult<&LinkerObject> {
        Ok(&self.contract(contract_name)?.runtime_object)
    }

    pub fn clone_object(&self, contract_name: &str) -> CompileResult<&LinkerObject> {
        Ok(&self.contract(contract_name)?.clone_object)
    }

    /// The keccak-256 hash of the runtime bytecode, or the zero hash while
    /// the object is empty or carries unresolved link references.
    pub fn contract_code_hash(&self, contract_name: &str) -> CompileResult<[u8; 32]> {
        let object = self.runtime_object(contract_name)?;
        if object.bytecode.is_empty() || !object.is_sealed() {
            Ok([0u8; 32])
        } else {
            Ok(keccak256(&object.bytecode))
        }
    }

    pub fn assembly_items(&self, contract_name: &str) -> CompileResult<Option<&[AssemblyItem]>> {
        let record = self.contract(contract_name)?;
        Ok(record.compiler.as_ref().map(|compiler| compiler.assembly_items()))
    }

    pub fn runtime_assembly_items(
        &self,
        contract_name: &str,
    ) -> CompileResult<Option<&[AssemblyItem]>> {
        let record = self.contract(contract_name)?;
        Ok(record
            .compiler
            .as_ref()
            .map(|compiler| compiler.runtime_assembly_items()))
    }

    pub fn stream_assembly(
        &self,
        out: &mut dyn Write,
        contract_name: &str,
        source_codes: &BTreeMap<String, String>,
        json_format: bool,
    ) -> CompileResult<serde_json::Value> {
        let record = self.contract(contract_name)?;
        match &record.compiler {
            Some(compiler) => compiler.stream_assembly(out, source_codes, json_format),
            None => {
                writeln!(out, "Contract not fully implemented")
                    .map_err(|err| CompileError::compiler(format!("stream failed: {}", err)))?;
                Ok(serde_json::Value::Null)
            }
        }
    }

    /// The ABI JSON of a contract.
    pub fn interface(&mut self, contract_name: &str) -> CompileResult<String> {
        self.metadata(contract_name, DocumentationKind::Abi)
    }

    /// The contract rendered as bodyless source.
    pub fn source_interface(&mut self, contract_name: &str) -> CompileResult<String> {
        self.metadata(contract_name, DocumentationKind::SourceInterface)
    }

    /// Interface or documentation artifacts, computed on first access and
    /// cached until the next reset.
    pub fn metadata(
        &mut self,
        contract_name: &str,
        kind: DocumentationKind,
    ) -> CompileResult<String> {
        self.require_parsed()?;
        let name = self.resolve_contract_name(contract_name)?;

        if let Some(cached) = self.cached_metadata(&name, kind) {
            return Ok(cached);
        }

        let record = self
            .contracts
            .get(&name)
            .ok_or_else(|| CompileError::compiler(format!("contract {} not found", name)))?;
        let attrs = self
            .analysis
            .get_contract(record.id)
            .expect("contract record without analysis attributes")
            .clone();
        let contract = find_contract_node(&self.sources, &record.source, record.id);
        let handler = InterfaceHandler::new();
        let text = handler.documentation(&self.analysis, contract, &attrs, kind)?;

        let record = self.contracts.get_mut(&name).expect("record exists");
        let slot = match kind {
            DocumentationKind::NatspecUser => &mut record.user_documentation,
            DocumentationKind::NatspecDev => &mut record.dev_documentation,
            DocumentationKind::Abi => &mut record.interface,
            DocumentationKind::SourceInterface => &mut record.source_interface,
        };
        *slot = Some(text.clone());
        Ok(text)
    }

    /// The AST node of a contract definition.
    pub fn contract_definition(&self, contract_name: &str) -> CompileResult<&Node<ast::Contract>> {
        let record = self.contract(contract_name)?;
        Ok(find_contract_node(&self.sources, &record.source, record.id))
    }

    /// Resolved attributes of a contract (inheritance, members, layout).
    pub fn contract_attributes(&self, contract_name: &str) -> CompileResult<&ContractAttributes> {
        let record = self.contract(contract_name)?;
        self.analysis
            .get_contract(record.id)
            .ok_or_else(|| CompileError::compiler("contract was not resolved"))
    }

    /// Index of the function's entry tag within the runtime assembly
    /// items, or 0 when unknown.
    pub fn function_entry_point(
        &self,
        contract_name: &str,
        func: &Node<ast::Function>,
    ) -> CompileResult<usize> {
        let record = self.contract(contract_name)?;
        let Some(compiler) = &record.compiler else {
            return Ok(0);
        };
        let Some(tag) = compiler.function_entry_label(func) else {
            return Ok(0);
        };
        for (index, item) in compiler.runtime_assembly_items().iter().enumerate() {
            if item.is_tag() && item.data() == Some(tag) {
                return Ok(index);
            }
        }
        Ok(0)
    }

    pub fn scanner(&self, source_name: &str) -> CompileResult<&Scanner> {
        Ok(&self.source(source_name)?.scanner)
    }

    pub fn ast(&self, source_name: &str) -> CompileResult<&Node<ast::Module>> {
        self.source(source_name)?
            .ast
            .as_ref()
            .ok_or_else(|| CompileError::compiler("parsing was not successful"))
    }

    /// Translate a source location to 1-based
    /// `(start line, start column, end line, end column)`.
    pub fn position_from_source_location(
        &self,
        location: &SourceLocation,
    ) -> CompileResult<(usize, usize, usize, usize)> {
        let scanner = self.scanner(&location.source)?;
        let (start_line, start_column) =
            scanner.translate_position_to_line_column(location.span.start);
        let (end_line, end_column) = scanner.translate_position_to_line_column(location.span.end);
        Ok((
            start_line + 1,
            start_column + 1,
            end_line + 1,
            end_column + 1,
        ))
    }

    // ---- internals ----

    fn require_parsed(&self) -> CompileResult<()> {
        if self.parse_successful {
            Ok(())
        } else {
            Err(CompileError::compiler("parsing was not successful"))
        }
    }

    fn contract(&self, contract_name: &str) -> CompileResult<&ContractRecord> {
        let name = self.resolve_contract_name(contract_name)?;
        self.contracts
            .get(&name)
            .ok_or_else(|| CompileError::compiler(format!("contract {} not found", contract_name)))
    }

    /// An empty name picks the last user-supplied (non-standard-library)
    /// contract encountered in source order. A convenience with history;
    /// surprising when several contracts share one file.
    fn resolve_contract_name(&self, contract_name: &str) -> CompileResult<String> {
        if self.contracts.is_empty() {
            return Err(CompileError::compiler("no compiled contracts found"));
        }
        if !contract_name.is_empty() {
            return Ok(contract_name.to_string());
        }
        let mut candidate = String::new();
        for (source_name, source) in &self.sources {
            if is_standard_source(source_name) {
                continue;
            }
            if let Some(ast) = &source.ast {
                for stmt in &ast.kind.body {
                    if let ModuleStmt::Contract(contract) = stmt {
                        candidate = contract.kind.name.kind.clone();
                    }
                }
            }
        }
        if candidate.is_empty() {
            Err(CompileError::compiler("no user-supplied contract found"))
        } else {
            Ok(candidate)
        }
    }

    fn cached_metadata(&self, name: &str, kind: DocumentationKind) -> Option<String> {
        let record = self.contracts.get(name)?;
        match kind {
            DocumentationKind::NatspecUser => record.user_documentation.clone(),
            DocumentationKind::NatspecDev => record.dev_documentation.clone(),
            DocumentationKind::Abi => record.interface.clone(),
            DocumentationKind::SourceInterface => record.source_interface.clone(),
        }
    }

    fn source(&self, source_name: &str) -> CompileResult<&Source> {
        self.sources
            .get(source_name)
            .ok_or_else(|| CompileError::compiler("given source file not found"))
    }
}

/// Post-order depth-first topological sort of the import graph. Roots are
/// the non-library sources, visited in key order; cycles are cut silently
/// by the visited set. Every import edge A imports B puts B before A.
fn resolve_imports(sources: &BTreeMap<String, Source>) -> CompileResult<Vec<String>> {
    let mut order = vec![];
    let mut seen: BTreeSet<String> = BTreeSet::new();

    fn visit(
        name: &str,
        sources: &BTreeMap<String, Source>,
        seen: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> CompileResult<()> {
        if seen.contains(name) {
            return Ok(());
        }
        seen.insert(name.to_string());
        let source = &sources[name];
        if let Some(ast) = &source.ast {
            for stmt in &ast.kind.body {
                if let ModuleStmt::Import(import) = stmt {
                    let target = &import.kind.name.kind;
                    if !sources.contains_key(target) {
                        return Err(ParseError::new(
                            "source not found",
                            SourceLocation::new(import.span, name),
                        )
                        .into());
                    }
                    visit(target, sources, seen, order)?;
                }
            }
        }
        order.push(name.to_string());
        Ok(())
    }

    for (name, source) in sources {
        if !source.is_library {
            visit(name, sources, &mut seen, &mut order)?;
        }
    }
    Ok(order)
}

fn build_contract_asts<'b>(
    sources: &'b BTreeMap<String, Source>,
    order: &[String],
) -> ContractAsts<'b> {
    let mut asts = ContractAsts::new();
    for name in order {
        let (source_name, source) = sources
            .get_key_value(name)
            .expect("source order refers to a registered source");
        if let Some(ast) = &source.ast {
            for stmt in &ast.kind.body {
                if let ModuleStmt::Contract(contract) = stmt {
                    asts.insert(
                        contract.kind.name.kind.clone(),
                        (contract, source_name.as_str()),
                    );
                }
            }
        }
    }
    asts
}

fn find_contract_node<'b>(
    sources: &'b BTreeMap<String, Source>,
    source_name: &str,
    id: NodeId,
) -> &'b Node<ast::Contract> {
    let ast = sources[source_name]
        .ast
        .as_ref()
        .expect("contract record refers to an unparsed source");
    for stmt in &ast.kind.body {
        if let ModuleStmt::Contract(contract) = stmt {
            if contract.id == id {
                return contract;
            }
        }
    }
    panic!("contract record refers to a vanished definition");
}
