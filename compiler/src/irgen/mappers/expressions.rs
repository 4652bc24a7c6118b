//! Expression lowering. Expressions that need statement context (short
//! circuits, contract creation) append to the surrounding statement sink
//! and evaluate to a temporary.

use super::functions::FnLowering;
use crate::constants::RESERVED_BASE;
use crate::errors::CompileResult;
use crate::ir::{Block, Expression, Statement};
use crate::irgen::context::Arity;
use crate::irgen::names;
use pact_analyzer::builtins::{BlockField, GlobalFunction, MsgField, Object};
use pact_analyzer::context::{Binding, CallType};
use pact_analyzer::namespace::types::Type;
use pact_common::numeric;
use pact_parser::ast::{BinOperator, BoolOperator, CompOperator, Expr, UnaryOperator};
use pact_parser::node::{Node, NodeId};
use std::collections::BTreeMap;
use std::str::FromStr;

pub fn lower_expr(
    fl: &mut FnLowering<'_, '_>,
    sink: &mut Block,
    expr: &Node<Expr>,
) -> CompileResult<Expression> {
    match &expr.kind {
        Expr::Num(text) => {
            let word = numeric::Literal::new(text)
                .parse_word()
                .expect("overlarge literal survived type checking");
            Ok(Expression::lit(numeric::to_hex_literal(&word)))
        }
        Expr::Bool(value) => Ok(Expression::lit(if *value { "0x1" } else { "0x0" })),
        Expr::Str(_) => panic!("string literal in value position survived type checking"),
        Expr::Name(_) => lower_name(fl, expr),
        Expr::Attribute { value, attr } => {
            let Some(Binding::Magic(obj)) = fl.analysis.get_binding(value.id) else {
                panic!("attribute on a non-magic object survived type checking");
            };
            let target = match obj {
                Object::Msg => match MsgField::from_str(&attr.kind) {
                    Ok(MsgField::Sender) => "caller",
                    Ok(MsgField::Value) => "callvalue",
                    Err(_) => panic!("unknown msg field survived type checking"),
                },
                Object::Block => match BlockField::from_str(&attr.kind) {
                    Ok(BlockField::Number) => "number",
                    Ok(BlockField::Timestamp) => "timestamp",
                    Err(_) => panic!("unknown block field survived type checking"),
                },
            };
            Ok(Expression::call(target, vec![]))
        }
        Expr::UnaryOperation { op, operand } => {
            let operand = lower_expr(fl, sink, operand)?;
            Ok(match op.kind {
                UnaryOperator::Not => Expression::call("iszero", vec![operand]),
                UnaryOperator::USub => {
                    Expression::call("sub", vec![Expression::dec(0), operand])
                }
            })
        }
        Expr::BinOperation { left, op, right } => {
            let left = lower_expr(fl, sink, left)?;
            let right = lower_expr(fl, sink, right)?;
            let name = match op.kind {
                BinOperator::Add => "add",
                BinOperator::Sub => "sub",
                BinOperator::Mult => "mul",
                BinOperator::Div => "div",
                BinOperator::Mod => "mod",
            };
            let checked = fl.ctx.utils().checked_op(name);
            Ok(Expression::call(checked, vec![left, right]))
        }
        Expr::CompOperation { left, op, right } => {
            let left = lower_expr(fl, sink, left)?;
            let right = lower_expr(fl, sink, right)?;
            Ok(match op.kind {
                CompOperator::Eq => Expression::call("eq", vec![left, right]),
                CompOperator::NotEq => Expression::call(
                    "iszero",
                    vec![Expression::call("eq", vec![left, right])],
                ),
                CompOperator::Lt => Expression::call("lt", vec![left, right]),
                CompOperator::LtE => Expression::call(
                    "iszero",
                    vec![Expression::call("gt", vec![left, right])],
                ),
                CompOperator::Gt => Expression::call("gt", vec![left, right]),
                CompOperator::GtE => Expression::call(
                    "iszero",
                    vec![Expression::call("lt", vec![left, right])],
                ),
            })
        }
        Expr::BoolOperation { left, op, right } => {
            // short circuit: the right operand only evaluates when needed
            let flag = fl.ctx.new_ir_variable();
            let left = lower_expr(fl, sink, left)?;
            sink.push(Statement::VariableDeclaration {
                names: vec![flag.clone()],
                value: Some(left),
            });
            let mut rhs_sink = vec![];
            let right = lower_expr(fl, &mut rhs_sink, right)?;
            rhs_sink.push(Statement::Assignment {
                name: flag.clone(),
                value: right,
            });
            let condition = match op.kind {
                BoolOperator::And => Expression::id(&flag),
                BoolOperator::Or => Expression::call("iszero", vec![Expression::id(&flag)]),
            };
            sink.push(Statement::If {
                condition,
                body: rhs_sink,
            });
            Ok(Expression::id(flag))
        }
        Expr::New { contract, args } => lower_create(fl, sink, expr, contract, args),
        Expr::Call { func, args } => {
            let call = fl
                .analysis
                .get_call(expr.id)
                .expect("call was not attributed")
                .clone();
            match call {
                CallType::Internal { function } => {
                    let target = fl.resolve_virtual(function);
                    let def = fl.defs[&target];
                    let name = fl.ctx.enqueue_function_for_code_generation(def);
                    let args = lower_args(fl, sink, args)?;
                    Ok(Expression::call(name, args))
                }
                CallType::Super { function } => {
                    let def = fl.defs[&function];
                    let name = fl.ctx.enqueue_function_for_code_generation(def);
                    let args = lower_args(fl, sink, args)?;
                    Ok(Expression::call(name, args))
                }
                CallType::ViaPointer { params, returns } => {
                    fl.ctx.internal_function_called_through_dispatch(Arity {
                        inputs: params,
                        outputs: returns,
                    });
                    let pointer = lower_expr(fl, sink, func)?;
                    let mut all_args = vec![pointer];
                    all_args.extend(lower_args(fl, sink, args)?);
                    Ok(Expression::call(names::dispatch_name(params, returns), all_args))
                }
                CallType::TypeConstructor { typ } => {
                    let operand_typ = fl
                        .analysis
                        .get_expression(args[0].id)
                        .map(|attrs| attrs.typ.clone());
                    let operand = lower_expr(fl, sink, &args[0])?;
                    Ok(lower_conversion(fl, &typ, operand_typ, operand))
                }
                CallType::BuiltinFunction { .. } => {
                    panic!("builtin call in value position survived type checking")
                }
                CallType::Create { .. } => {
                    panic!("`new` recorded on a plain call expression")
                }
            }
        }
    }
}

fn lower_name(fl: &mut FnLowering<'_, '_>, expr: &Node<Expr>) -> CompileResult<Expression> {
    let binding = fl
        .analysis
        .get_binding(expr.id)
        .expect("name was not bound")
        .clone();
    match binding {
        Binding::Local(decl) => Ok(Expression::id(fl.ctx.local_variable(decl).name.clone())),
        Binding::StateVar(decl) => {
            let var = fl.state_var(decl);
            if var.immutable {
                if fl.construction {
                    let offset = RESERVED_BASE + fl.ctx.immutable_memory_offset(decl);
                    Ok(Expression::call("mload", vec![Expression::dec(offset)]))
                } else {
                    Ok(Expression::call(
                        "loadimmutable",
                        vec![Expression::dec(fl.ctx.immutable_index(decl))],
                    ))
                }
            } else {
                let (slot, byte_offset) = fl.ctx.storage_location_of_state_variable(decl);
                let read = fl.ctx.utils().read_storage(&var.typ, byte_offset);
                Ok(Expression::call(read, vec![Expression::dec(slot as usize)]))
            }
        }
        Binding::Function(id) => {
            // an internal function used as a value: represented by its
            // ordinal in the hierarchy (zero stays the trap value for
            // uninitialized pointers), resolved at runtime through the
            // dispatch routine for its arity
            let target = fl.resolve_virtual(id);
            let def = fl.defs[&target];
            fl.ctx.add_to_internal_dispatch(def);
            Ok(Expression::dec(function_ordinal(fl.defs, target)))
        }
        Binding::ContractRef(id) => {
            let name = fl
                .analysis
                .get_contract(id)
                .expect("referenced contract was not resolved")
                .name
                .clone();
            Ok(Expression::call(
                "linkersymbol",
                vec![Expression::StringLiteral(name)],
            ))
        }
        Binding::This => Ok(Expression::call("address", vec![])),
        _ => panic!("unexpected binding in value position"),
    }
}

fn lower_conversion(
    fl: &mut FnLowering<'_, '_>,
    target: &Type,
    operand_typ: Option<Type>,
    operand: Expression,
) -> Expression {
    match target {
        Type::Address | Type::Contract(_) => match fl.ctx.utils().cleanup(&Type::Address) {
            Some(cleanup) => Expression::call(cleanup, vec![operand]),
            None => operand,
        },
        Type::Uint => match operand_typ {
            Some(Type::Bytes(len)) => Expression::call(
                "shr",
                vec![Expression::dec((32 - len as usize) * 8), operand],
            ),
            _ => operand,
        },
        Type::Bytes(len) => match operand_typ {
            Some(Type::Bytes(_)) => operand,
            // take the low N bytes of the word and left-align them
            _ => Expression::call(
                "shl",
                vec![Expression::dec((32 - *len as usize) * 8), operand],
            ),
        },
        Type::Bool | Type::Function(_) => operand,
    }
}

/// `new C(...)`: copy the creation object of `C` into memory, append the
/// encoded constructor arguments and `create` the instance.
fn lower_create(
    fl: &mut FnLowering<'_, '_>,
    sink: &mut Block,
    expr: &Node<Expr>,
    contract: &Node<String>,
    args: &[Node<Expr>],
) -> CompileResult<Expression> {
    debug_assert!(matches!(
        fl.analysis.get_call(expr.id),
        Some(CallType::Create { .. })
    ));
    fl.ctx
        .sub_objects_created()
        .insert(contract.kind.clone());

    let data_name = Expression::StringLiteral(contract.kind.clone());
    let size = Expression::call("datasize", vec![data_name.clone()]);

    // argument evaluation may itself allocate (nested creations), so it
    // happens before the creation object is copied to the heap front
    let mut arg_vars = vec![];
    for arg in args {
        let value = lower_expr(fl, sink, arg)?;
        let var = fl.ctx.new_ir_variable();
        sink.push(Statement::VariableDeclaration {
            names: vec![var.clone()],
            value: Some(value),
        });
        arg_vars.push(var);
    }

    let ptr = fl.ctx.new_ir_variable();
    sink.push(Statement::VariableDeclaration {
        names: vec![ptr.clone()],
        value: Some(Expression::call("mload", vec![Expression::dec(0x40)])),
    });
    sink.push(Statement::Expression(Expression::call(
        "codecopy",
        vec![
            Expression::id(&ptr),
            Expression::call("dataoffset", vec![data_name]),
            size.clone(),
        ],
    )));

    for (idx, var) in arg_vars.iter().enumerate() {
        sink.push(Statement::Expression(Expression::call(
            "mstore",
            vec![
                Expression::call(
                    "add",
                    vec![
                        Expression::id(&ptr),
                        Expression::call("add", vec![size.clone(), Expression::dec(32 * idx)]),
                    ],
                ),
                Expression::id(var),
            ],
        )));
    }

    let instance = fl.ctx.new_ir_variable();
    sink.push(Statement::VariableDeclaration {
        names: vec![instance.clone()],
        value: Some(Expression::call(
            "create",
            vec![
                Expression::dec(0),
                Expression::id(&ptr),
                Expression::call("add", vec![size, Expression::dec(32 * args.len())]),
            ],
        )),
    });
    sink.push(Statement::If {
        condition: Expression::call("iszero", vec![Expression::id(&instance)]),
        body: vec![Statement::Expression(Expression::call(
            "revert",
            vec![Expression::dec(0), Expression::dec(0)],
        ))],
    });
    Ok(Expression::id(instance))
}

/// Lower an expression statement. Builtin calls expand to control flow
/// here; everything else becomes a plain expression statement.
pub fn lower_call_stmt(
    fl: &mut FnLowering<'_, '_>,
    sink: &mut Block,
    expr: &Node<Expr>,
) -> CompileResult<()> {
    if let Expr::Call { func: _, args } = &expr.kind {
        if let Some(CallType::BuiltinFunction { func }) = fl.analysis.get_call(expr.id).cloned() {
            match func {
                GlobalFunction::Require => {
                    let cond = lower_expr(fl, sink, &args[0])?;
                    let message = match args.get(1).map(|arg| &arg.kind) {
                        Some(Expr::Str(text)) => text.clone(),
                        _ => String::new(),
                    };
                    let mut body = fl.ctx.revert_reason_if_debug(&message);
                    body.push(Statement::Expression(Expression::call(
                        "revert",
                        vec![Expression::dec(0), Expression::dec(0)],
                    )));
                    sink.push(Statement::If {
                        condition: Expression::call("iszero", vec![cond]),
                        body,
                    });
                }
                GlobalFunction::Revert => {
                    let message = match args.first().map(|arg| &arg.kind) {
                        Some(Expr::Str(text)) => text.clone(),
                        _ => String::new(),
                    };
                    sink.extend(fl.ctx.revert_reason_if_debug(&message));
                    sink.push(Statement::Expression(Expression::call(
                        "revert",
                        vec![Expression::dec(0), Expression::dec(0)],
                    )));
                }
                GlobalFunction::Selfdestruct => {
                    let target = lower_expr(fl, sink, &args[0])?;
                    sink.push(Statement::Expression(Expression::call(
                        "selfdestruct",
                        vec![target],
                    )));
                }
            }
            return Ok(());
        }
    }

    let lowered = lower_expr(fl, sink, expr)?;
    sink.push(Statement::Expression(lowered));
    Ok(())
}

/// The 1-based position of a function among all definitions reachable in
/// the hierarchy. Stable across runs, unlike the raw node id.
pub fn function_ordinal(
    defs: &BTreeMap<NodeId, &Node<pact_parser::ast::Function>>,
    id: NodeId,
) -> usize {
    defs.keys()
        .position(|known| *known == id)
        .expect("function is not part of the hierarchy")
        + 1
}

fn lower_args(
    fl: &mut FnLowering<'_, '_>,
    sink: &mut Block,
    args: &[Node<Expr>],
) -> CompileResult<Vec<Expression>> {
    args.iter().map(|arg| lower_expr(fl, sink, arg)).collect()
}
