//! Per-contract lowering: external wrappers, the selector dispatcher, the
//! queue-driven function loop, internal dispatch routines, and the
//! deployment code.

use super::functions::lower_function;
use crate::constants::{FRAME_BASE, RESERVED_BASE};
use crate::errors::CompileResult;
use crate::ir::{Code, Expression, Statement};
use crate::irgen::context::{InternalDispatchMap, IrContext};
use crate::irgen::functions::create_function;
use crate::irgen::names;
use pact_analyzer::context::{AnalysisContext, ContractAttributes};
use pact_analyzer::namespace::types::FunctionSig;
use pact_analyzer::ContractAsts;
use pact_common::utils::hash::function_selector;
use pact_parser::ast;
use pact_parser::node::{Node, NodeId};
use std::collections::BTreeMap;

pub struct LoweredContract {
    pub deploy: Code,
    pub runtime: Code,
    /// Contracts instantiated with `new`, in first-use order; each becomes
    /// a nested sub-assembly.
    pub created_contracts: Vec<String>,
}

/// Lower one contract to its deployment and runtime code objects.
pub fn lower_contract<'a>(
    ctx: &mut IrContext<'a>,
    analysis: &AnalysisContext,
    asts: &ContractAsts<'a>,
    attrs: &ContractAttributes,
) -> CompileResult<LoweredContract> {
    ctx.set_most_derived_contract(attrs.id, &attrs.name);

    for var in &attrs.variables {
        if var.immutable {
            ctx.register_immutable_variable(var.id);
        } else {
            ctx.add_state_variable(var.id, var.slot, var.byte_offset);
        }
    }

    let defs = collect_defs(asts, attrs);

    // external wrappers for the public interface; the selector dispatcher
    // routes into them
    let mut dispatcher = vec![];
    for sig in attrs.public_functions() {
        if !sig.has_body {
            continue;
        }
        let def = defs[&sig.id];
        let inner = ctx.enqueue_function_for_code_generation(def);
        let wrapper = lower_external_wrapper(ctx, sig, &inner);
        let selector = u32::from_be_bytes(function_selector(&sig.selector_signature()));
        dispatcher.push(Statement::If {
            condition: Expression::call(
                "eq",
                vec![
                    Expression::id("$selector"),
                    Expression::lit(format!("0x{:08x}", selector)),
                ],
            ),
            body: vec![Statement::Expression(Expression::call(wrapper, vec![]))],
        });
    }

    let mut runtime_block = vec![
        mstore(0x40, Expression::dec(RESERVED_BASE)),
        mstore(0x60, Expression::dec(FRAME_BASE)),
    ];
    runtime_block.push(Statement::If {
        condition: Expression::call(
            "iszero",
            vec![Expression::call(
                "lt",
                vec![Expression::call("calldatasize", vec![]), Expression::dec(4)],
            )],
        ),
        body: {
            let mut body = vec![Statement::VariableDeclaration {
                names: vec!["$selector".to_string()],
                value: Some(Expression::call(
                    "shr",
                    vec![
                        Expression::dec(224),
                        Expression::call("calldataload", vec![Expression::dec(0)]),
                    ],
                )),
            }];
            body.extend(dispatcher);
            body
        },
    });
    runtime_block.push(Statement::Expression(Expression::call(
        "revert",
        vec![Expression::dec(0), Expression::dec(0)],
    )));

    // drain the queue; newly discovered dispatch arities produce routines
    // which may in turn enqueue more functions
    drain_queue(ctx, analysis, &defs, false)?;

    // constructors run base-most first; they are lowered outside the queue
    // because immutable accesses lower differently at construction time
    for ctor in &attrs.constructors {
        let def = defs[ctor];
        lower_function(ctx, analysis, &defs, def, true)?;
    }
    drain_queue(ctx, analysis, &defs, false)?;

    let own_ctor = asts[&attrs.name]
        .0
        .kind
        .functions()
        .find(|func| func.kind.is_constructor())
        .map(|func| func.id);
    let deploy_block = lower_deploy_code(ctx, attrs, &defs, own_ctor);

    let functions = ctx.function_collector().borrow().requested_functions();
    let created_contracts: Vec<String> = ctx.sub_objects().iter().cloned().collect();

    Ok(LoweredContract {
        deploy: Code {
            name: attrs.name.clone(),
            block: deploy_block,
            functions: functions.clone(),
        },
        runtime: Code {
            name: names::runtime_object_name(&attrs.name),
            block: runtime_block,
            functions,
        },
        created_contracts,
    })
}

/// Every function definition reachable from the linearized hierarchy,
/// constructors included.
fn collect_defs<'a>(
    asts: &ContractAsts<'a>,
    attrs: &ContractAttributes,
) -> BTreeMap<NodeId, &'a Node<ast::Function>> {
    let mut defs = BTreeMap::new();
    for (_, name) in &attrs.linearized {
        let (contract_ast, _) = asts[name];
        for func in contract_ast.kind.functions() {
            defs.insert(func.id, func);
        }
    }
    defs
}

fn drain_queue<'a>(
    ctx: &mut IrContext<'a>,
    analysis: &AnalysisContext,
    defs: &BTreeMap<NodeId, &'a Node<ast::Function>>,
    construction: bool,
) -> CompileResult<()> {
    loop {
        while !ctx.function_generation_queue_empty() {
            let def = ctx.dequeue_function_for_code_generation();
            lower_function(ctx, analysis, defs, def, construction)?;
        }
        if ctx.internal_dispatch_clean() {
            return Ok(());
        }
        let dispatch = ctx.consume_internal_dispatch_map();
        generate_internal_dispatch_functions(ctx, defs, &dispatch);
    }
}

/// One routine per arity, branching on the ordinal carried by the pointer
/// value. Unknown or never-assigned ordinals trap.
fn generate_internal_dispatch_functions(
    ctx: &mut IrContext<'_>,
    defs: &BTreeMap<NodeId, &Node<ast::Function>>,
    dispatch: &InternalDispatchMap,
) {
    let collector = ctx.function_collector();
    for (arity, targets) in dispatch {
        let name = names::dispatch_name(arity.inputs, arity.outputs);
        let params: Vec<String> = std::iter::once("fn_id".to_string())
            .chain((0..arity.inputs).map(|idx| format!("p{}", idx)))
            .collect();
        let returns: Vec<String> = (0..arity.outputs).map(|idx| format!("r{}", idx)).collect();

        let mut body = vec![];
        for target in targets.iter().flatten() {
            let def = ctx.queued_definition(*target);
            let call = Expression::call(
                names::function_name(def),
                (0..arity.inputs)
                    .map(|idx| Expression::id(format!("p{}", idx)))
                    .collect(),
            );
            let mut arm = vec![];
            if arity.outputs > 0 {
                arm.push(Statement::Assignment {
                    name: "r0".to_string(),
                    value: call,
                });
            } else {
                arm.push(Statement::Expression(call));
            }
            arm.push(Statement::Leave);
            body.push(Statement::If {
                condition: Expression::call(
                    "eq",
                    vec![
                        Expression::id("fn_id"),
                        Expression::dec(super::expressions::function_ordinal(defs, *target)),
                    ],
                ),
                body: arm,
            });
        }
        body.push(Statement::Expression(Expression::call("invalid", vec![])));

        create_function(&collector, &name, || crate::ir::FunctionDefinition {
            name: name.clone(),
            params: params.clone(),
            returns: returns.clone(),
            body,
        });
    }
}

/// The ABI wrapper for one public function: validate calldata, decode the
/// arguments, call the implementation, encode and return the result.
fn lower_external_wrapper(
    ctx: &mut IrContext<'_>,
    sig: &FunctionSig,
    inner_name: &str,
) -> String {
    let name = names::external_function_name(&sig.name, sig.id);
    let abi = ctx.abi_functions();
    let collector = ctx.function_collector();
    let param_types = sig.param_types();
    let returns = sig.returns.clone();
    let inner_name = inner_name.to_string();

    create_function(&collector, &name, || {
        let mut body = vec![Statement::If {
            condition: Expression::call(
                "lt",
                vec![
                    Expression::call("calldatasize", vec![]),
                    Expression::dec(4 + 32 * param_types.len()),
                ],
            ),
            body: vec![Statement::Expression(Expression::call(
                "revert",
                vec![Expression::dec(0), Expression::dec(0)],
            ))],
        }];

        let mut args = vec![];
        for (idx, typ) in param_types.iter().enumerate() {
            let decode = abi.decode(typ);
            let var = format!("$p{}", idx);
            body.push(Statement::VariableDeclaration {
                names: vec![var.clone()],
                value: Some(Expression::call(
                    decode,
                    vec![Expression::dec(4 + 32 * idx)],
                )),
            });
            args.push(Expression::id(var));
        }

        let call = Expression::call(&inner_name, args);
        match returns.first() {
            Some(ret) => {
                body.push(Statement::VariableDeclaration {
                    names: vec!["$r".to_string()],
                    value: Some(call),
                });
                body.push(Statement::VariableDeclaration {
                    names: vec!["$m".to_string()],
                    value: Some(Expression::call("mload", vec![Expression::dec(0x40)])),
                });
                let encode = abi.encode(ret);
                body.push(Statement::Expression(Expression::call(
                    encode,
                    vec![Expression::id("$m"), Expression::id("$r")],
                )));
                body.push(Statement::Expression(Expression::call(
                    "return",
                    vec![Expression::id("$m"), Expression::dec(32)],
                )));
            }
            None => {
                body.push(Statement::Expression(call));
                body.push(Statement::Expression(Expression::call(
                    "return",
                    vec![Expression::dec(0), Expression::dec(0)],
                )));
            }
        }

        crate::ir::FunctionDefinition {
            name: name.clone(),
            params: vec![],
            returns: vec![],
            body,
        }
    })
}

/// The deployment code: reserve memory, run constructors, copy out the
/// runtime object and append the immutable values as trailing code data.
fn lower_deploy_code(
    ctx: &mut IrContext<'_>,
    attrs: &ContractAttributes,
    defs: &BTreeMap<NodeId, &Node<ast::Function>>,
    own_ctor: Option<NodeId>,
) -> Vec<Statement> {
    let runtime_name = names::runtime_object_name(&attrs.name);
    let immutable_count = ctx.immutable_count();
    // one-shot: initializes the free memory pointer past the immutables
    let reserved = ctx.reserved_memory();
    let heap_base = RESERVED_BASE + reserved;

    let mut block = vec![
        mstore(0x40, Expression::dec(heap_base)),
        mstore(0x60, Expression::dec(FRAME_BASE)),
    ];

    // the most-derived constructor's arguments are appended to the
    // deployment bytecode as raw words
    let own_ctor_params = own_ctor
        .map(|id| defs[&id].kind.params.len())
        .unwrap_or(0);
    if own_ctor_params > 0 {
        block.push(Statement::VariableDeclaration {
            names: vec!["$cargs".to_string()],
            value: Some(Expression::call("mload", vec![Expression::dec(0x40)])),
        });
        block.push(Statement::Expression(Expression::call(
            "codecopy",
            vec![
                Expression::id("$cargs"),
                Expression::call(
                    "sub",
                    vec![
                        Expression::call("codesize", vec![]),
                        Expression::dec(32 * own_ctor_params),
                    ],
                ),
                Expression::dec(32 * own_ctor_params),
            ],
        )));
    }

    for ctor in &attrs.constructors {
        let def = defs[ctor];
        let args = if own_ctor == Some(*ctor) && !def.kind.params.is_empty() {
            (0..def.kind.params.len())
                .map(|idx| {
                    Expression::call(
                        "mload",
                        vec![Expression::call(
                            "add",
                            vec![Expression::id("$cargs"), Expression::dec(32 * idx)],
                        )],
                    )
                })
                .collect()
        } else {
            vec![]
        };
        block.push(Statement::Expression(Expression::call(
            names::function_name(def),
            args,
        )));
    }

    let datasize = Expression::call(
        "datasize",
        vec![Expression::StringLiteral(runtime_name.clone())],
    );
    block.push(Statement::Expression(Expression::call(
        "codecopy",
        vec![
            Expression::dec(heap_base),
            Expression::call(
                "dataoffset",
                vec![Expression::StringLiteral(runtime_name.clone())],
            ),
            datasize.clone(),
        ],
    )));

    for idx in 0..immutable_count {
        block.push(Statement::Expression(Expression::call(
            "mstore",
            vec![
                Expression::call(
                    "add",
                    vec![
                        Expression::dec(heap_base),
                        Expression::call(
                            "add",
                            vec![datasize.clone(), Expression::dec(32 * idx)],
                        ),
                    ],
                ),
                Expression::call(
                    "mload",
                    vec![Expression::dec(RESERVED_BASE + 32 * idx)],
                ),
            ],
        )));
    }

    block.push(Statement::Expression(Expression::call(
        "return",
        vec![
            Expression::dec(heap_base),
            Expression::call(
                "add",
                vec![datasize, Expression::dec(32 * immutable_count)],
            ),
        ],
    )));

    block
}

fn mstore(offset: usize, value: Expression) -> Statement {
    Statement::Expression(Expression::call(
        "mstore",
        vec![Expression::dec(offset), value],
    ))
}
