//! The per-contract emitter: drives lowering and code generation, owns the
//! resulting assemblies and linkable objects.

pub mod assembly;
pub mod codegen;
pub mod item;

pub use assembly::{Assembly, LinkRef, LinkerObject};
pub use item::{AssemblyItem, Opcode, TagId};

use crate::constants::FRAME_BASE;
use crate::errors::{CompileError, CompileResult};
use crate::ir::{Code, Expression, Statement};
use crate::irgen::mappers::contracts::lower_contract;
use crate::irgen::{names, IrContext, RevertStrings};
use pact_analyzer::context::{AnalysisContext, ContractAttributes};
use pact_analyzer::ContractAsts;
use pact_parser::ast;
use pact_parser::node::Node;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;

/// Compiles a single contract to deployment, runtime and clone bytecode.
pub struct ContractCompiler {
    optimize: bool,
    #[allow(dead_code)]
    runs: u32,
    revert_strings: RevertStrings,
    assembly: Option<Assembly>,
    object: LinkerObject,
    runtime_object: LinkerObject,
    entry_tags: BTreeMap<String, TagId>,
}

impl ContractCompiler {
    pub fn new(optimize: bool, runs: u32, revert_strings: RevertStrings) -> Self {
        Self {
            optimize,
            runs,
            revert_strings,
            assembly: None,
            object: LinkerObject::default(),
            runtime_object: LinkerObject::default(),
            entry_tags: BTreeMap::new(),
        }
    }

    /// Compile the contract. `compiled_contracts` holds the deployment
    /// assemblies of contracts compiled earlier in topological order; any
    /// contract instantiated with `new` must already be in it.
    pub fn compile_contract(
        &mut self,
        analysis: &AnalysisContext,
        asts: &ContractAsts<'_>,
        attrs: &ContractAttributes,
        compiled_contracts: &BTreeMap<String, Assembly>,
    ) -> CompileResult<()> {
        let mut ctx = IrContext::new(self.revert_strings);
        let lowered = lower_contract(&mut ctx, analysis, asts, attrs)?;

        let runtime_name = names::runtime_object_name(&attrs.name);
        let mut runtime_map = BTreeMap::new();
        let mut deploy_map = BTreeMap::new();
        deploy_map.insert(runtime_name, 0usize);
        for (idx, created) in lowered.created_contracts.iter().enumerate() {
            runtime_map.insert(created.clone(), idx);
            deploy_map.insert(created.clone(), idx + 1);
        }

        let runtime_code = codegen::compile_code(&lowered.runtime, &runtime_map)?;
        let deploy_code = codegen::compile_code(&lowered.deploy, &deploy_map)?;

        let mut created_assemblies = vec![];
        for created in &lowered.created_contracts {
            let sub = compiled_contracts.get(created).ok_or_else(|| {
                CompileError::compiler(format!(
                    "contract `{}` must be compiled before it can be created",
                    created
                ))
            })?;
            created_assemblies.push(sub.clone());
        }

        let mut runtime_assembly = runtime_code.assembly;
        runtime_assembly.subs = created_assemblies.clone();

        let mut deploy_assembly = deploy_code.assembly;
        deploy_assembly.subs = vec![runtime_assembly];
        deploy_assembly.subs.extend(created_assemblies);

        if self.optimize && !ctx.inline_assembly_seen() {
            deploy_assembly.optimize();
        }

        self.entry_tags = runtime_code.entry_tags;
        self.runtime_object = deploy_assembly.subs[0].assemble();
        self.object = deploy_assembly.assemble();
        self.assembly = Some(deploy_assembly);
        Ok(())
    }

    /// Compile the clone: a small deployment object whose runtime forwards
    /// every call to an already deployed master copy via `delegatecall`.
    /// The master address is left as a link reference named after the
    /// contract.
    pub fn compile_clone(
        &mut self,
        attrs: &ContractAttributes,
        _compiled_contracts: &BTreeMap<String, Assembly>,
    ) -> CompileResult<()> {
        let clone_runtime_name = format!("{}_clone", attrs.name);
        let runtime = Code {
            name: clone_runtime_name.clone(),
            block: clone_runtime_block(&attrs.name),
            functions: vec![],
        };
        let deploy = Code {
            name: attrs.name.clone(),
            block: vec![
                Statement::Expression(Expression::call(
                    "codecopy",
                    vec![
                        Expression::dec(0),
                        Expression::call(
                            "dataoffset",
                            vec![Expression::StringLiteral(clone_runtime_name.clone())],
                        ),
                        Expression::call(
                            "datasize",
                            vec![Expression::StringLiteral(clone_runtime_name.clone())],
                        ),
                    ],
                )),
                Statement::Expression(Expression::call(
                    "return",
                    vec![
                        Expression::dec(0),
                        Expression::call(
                            "datasize",
                            vec![Expression::StringLiteral(clone_runtime_name.clone())],
                        ),
                    ],
                )),
            ],
            functions: vec![],
        };

        let mut deploy_map = BTreeMap::new();
        deploy_map.insert(clone_runtime_name, 0usize);
        let runtime_code = codegen::compile_code(&runtime, &BTreeMap::new())?;
        let deploy_code = codegen::compile_code(&deploy, &deploy_map)?;

        let mut deploy_assembly = deploy_code.assembly;
        deploy_assembly.subs = vec![runtime_code.assembly];
        if self.optimize {
            deploy_assembly.optimize();
        }

        self.runtime_object = deploy_assembly.subs[0].assemble();
        self.object = deploy_assembly.assemble();
        self.assembly = Some(deploy_assembly);
        Ok(())
    }

    /// The assembled deployment object.
    pub fn assembled_object(&self) -> &LinkerObject {
        &self.object
    }

    pub fn runtime_object(&self) -> &LinkerObject {
        &self.runtime_object
    }

    /// The deployment assembly.
    ///
    /// # Panics
    ///
    /// Panics if nothing was compiled yet.
    pub fn assembly(&self) -> &Assembly {
        self.assembly.as_ref().expect("no contract compiled")
    }

    pub fn assembly_items(&self) -> &[AssemblyItem] {
        &self.assembly().items
    }

    pub fn runtime_assembly_items(&self) -> &[AssemblyItem] {
        &self.assembly().subs[0].items
    }

    /// The entry tag of a compiled function inside the runtime assembly.
    pub fn function_entry_label(&self, func: &Node<ast::Function>) -> Option<TagId> {
        self.entry_tags.get(&names::function_name(func)).copied()
    }

    /// Stream the assembly in text or JSON form. The JSON value is also
    /// returned.
    pub fn stream_assembly(
        &self,
        out: &mut dyn Write,
        source_codes: &BTreeMap<String, String>,
        json_format: bool,
    ) -> CompileResult<serde_json::Value> {
        let assembly = self.assembly();
        if json_format {
            let value = json!({
                "sourceList": source_codes.keys().collect::<Vec<_>>(),
                ".code": assembly_json(assembly),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)
                .map_err(|err| CompileError::compiler(format!("stream failed: {}", err)))?;
            Ok(value)
        } else {
            stream_text(out, assembly, 0)
                .map_err(|err| CompileError::compiler(format!("stream failed: {}", err)))?;
            Ok(serde_json::Value::Null)
        }
    }
}

fn clone_runtime_block(master: &str) -> Vec<Statement> {
    vec![
        Statement::Expression(Expression::call(
            "mstore",
            vec![Expression::dec(0x60), Expression::dec(FRAME_BASE)],
        )),
        Statement::Expression(Expression::call(
            "calldatacopy",
            vec![
                Expression::dec(0),
                Expression::dec(0),
                Expression::call("calldatasize", vec![]),
            ],
        )),
        Statement::VariableDeclaration {
            names: vec!["success".to_string()],
            value: Some(Expression::call(
                "delegatecall",
                vec![
                    Expression::call("gas", vec![]),
                    Expression::call(
                        "linkersymbol",
                        vec![Expression::StringLiteral(master.to_string())],
                    ),
                    Expression::dec(0),
                    Expression::call("calldatasize", vec![]),
                    Expression::dec(0),
                    Expression::dec(0),
                ],
            )),
        },
        Statement::Expression(Expression::call(
            "returndatacopy",
            vec![
                Expression::dec(0),
                Expression::dec(0),
                Expression::call("returndatasize", vec![]),
            ],
        )),
        Statement::If {
            condition: Expression::id("success"),
            body: vec![Statement::Expression(Expression::call(
                "return",
                vec![
                    Expression::dec(0),
                    Expression::call("returndatasize", vec![]),
                ],
            ))],
        },
        Statement::Expression(Expression::call(
            "revert",
            vec![
                Expression::dec(0),
                Expression::call("returndatasize", vec![]),
            ],
        )),
    ]
}

fn assembly_json(assembly: &Assembly) -> serde_json::Value {
    let items: Vec<serde_json::Value> = assembly
        .items
        .iter()
        .map(|item| json!({ "name": item.to_string() }))
        .collect();
    let mut value = json!({ ".code": items });
    if !assembly.subs.is_empty() {
        let data: serde_json::Map<String, serde_json::Value> = assembly
            .subs
            .iter()
            .enumerate()
            .map(|(idx, sub)| (idx.to_string(), assembly_json(sub)))
            .collect();
        value[".data"] = serde_json::Value::Object(data);
    }
    value
}

fn stream_text(out: &mut dyn Write, assembly: &Assembly, depth: usize) -> std::io::Result<()> {
    for item in &assembly.items {
        writeln!(out, "{:indent$}{}", "", item, indent = depth * 2)?;
    }
    for (idx, sub) in assembly.subs.iter().enumerate() {
        writeln!(out, "{:indent$}.data {}:", "", idx, indent = depth * 2)?;
        stream_text(out, sub, depth + 1)?;
    }
    Ok(())
}
