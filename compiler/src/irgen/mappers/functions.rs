//! Statement-level lowering of function bodies.

use super::expressions::lower_expr;
use crate::constants::RESERVED_BASE;
use crate::errors::{CompileError, CompileResult};
use crate::ir::{Block, Expression, FunctionDefinition, Statement};
use crate::irgen::context::IrContext;
use crate::irgen::functions::create_function;
use crate::irgen::names;
use pact_analyzer::context::{AnalysisContext, Binding};
use pact_analyzer::namespace::types::StateVarInfo;
use pact_parser::ast::{self, Expr, FuncStmt};
use pact_parser::node::{Node, NodeId};
use std::collections::BTreeMap;

/// Lowering state for one function body.
pub struct FnLowering<'a, 'b> {
    pub ctx: &'b mut IrContext<'a>,
    pub analysis: &'b AnalysisContext,
    pub defs: &'b BTreeMap<NodeId, &'a Node<ast::Function>>,
    /// True while lowering constructor code; immutable accesses read and
    /// write the reserved memory region instead of the code data segment.
    pub construction: bool,
}

impl<'a, 'b> FnLowering<'a, 'b> {
    /// Resolve a virtually-bound function to the most derived override of
    /// its name. `super` calls bypass this.
    pub fn resolve_virtual(&self, function: NodeId) -> NodeId {
        let (contract, _) = self.ctx.most_derived_contract();
        let sig = self
            .analysis
            .get_function(function)
            .expect("called function was not resolved");
        self.analysis
            .get_contract(contract)
            .expect("contract under compilation was not resolved")
            .functions
            .get(&sig.name)
            .map(|merged| merged.id)
            .unwrap_or(function)
    }

    pub fn state_var(&self, decl: NodeId) -> StateVarInfo {
        let (contract, _) = self.ctx.most_derived_contract();
        self.analysis
            .get_contract(contract)
            .expect("contract under compilation was not resolved")
            .variables
            .iter()
            .find(|var| var.id == decl)
            .expect("unknown state variable")
            .clone()
    }
}

/// Lower a function definition into the collector. Repeated requests are
/// no-ops thanks to name-based deduplication.
pub fn lower_function<'a>(
    ctx: &mut IrContext<'a>,
    analysis: &AnalysisContext,
    defs: &BTreeMap<NodeId, &'a Node<ast::Function>>,
    def: &'a Node<ast::Function>,
    construction: bool,
) -> CompileResult<()> {
    let name = names::function_name(def);
    let collector = ctx.function_collector();
    if collector.borrow().contains(&name) {
        return Ok(());
    }

    let body = def
        .kind
        .body
        .as_ref()
        .expect("cannot lower a function without a body");

    let params: Vec<String> = def
        .kind
        .params
        .iter()
        .map(|param| ctx.add_local_variable(param).name)
        .collect();
    let returns: Vec<String> = if def.kind.returns.is_empty() {
        vec![]
    } else {
        vec!["ret".to_string()]
    };

    let mut lowering = FnLowering {
        ctx,
        analysis,
        defs,
        construction,
    };
    let block = lower_stmts(&mut lowering, body)?;

    create_function(&collector, &name, || FunctionDefinition {
        name: name.clone(),
        params,
        returns,
        body: block,
    });
    Ok(())
}

pub fn lower_stmts(fl: &mut FnLowering<'_, '_>, stmts: &[Node<FuncStmt>]) -> CompileResult<Block> {
    let mut block = vec![];
    for stmt in stmts {
        lower_stmt(fl, &mut block, stmt)?;
    }
    Ok(block)
}

fn lower_stmt(
    fl: &mut FnLowering<'_, '_>,
    sink: &mut Block,
    stmt: &Node<FuncStmt>,
) -> CompileResult<()> {
    match &stmt.kind {
        FuncStmt::VarDecl { decl, value } => {
            let value = value
                .as_ref()
                .map(|value| lower_expr(fl, sink, value))
                .transpose()?;
            let var = fl.ctx.add_local_variable(decl);
            sink.push(Statement::VariableDeclaration {
                names: vec![var.name],
                value,
            });
        }
        FuncStmt::Assign { target, value } => {
            let value = lower_expr(fl, sink, value)?;
            lower_assignment(fl, sink, target, value)?;
        }
        FuncStmt::If {
            test,
            body,
            or_else,
        } => {
            let cond = lower_expr(fl, sink, test)?;
            if or_else.is_empty() {
                let body = lower_stmts(fl, body)?;
                sink.push(Statement::If {
                    condition: cond,
                    body,
                });
            } else {
                // evaluate the condition once; branch on the stored value
                let flag = fl.ctx.new_ir_variable();
                sink.push(Statement::VariableDeclaration {
                    names: vec![flag.clone()],
                    value: Some(cond),
                });
                let body = lower_stmts(fl, body)?;
                sink.push(Statement::If {
                    condition: Expression::id(&flag),
                    body,
                });
                let or_else = lower_stmts(fl, or_else)?;
                sink.push(Statement::If {
                    condition: Expression::call("iszero", vec![Expression::id(&flag)]),
                    body: or_else,
                });
            }
        }
        FuncStmt::While { test, body } => {
            // the condition is re-evaluated inside the loop header, so any
            // side effects belong to a scratch block of their own
            let mut cond_sink = vec![];
            let cond = lower_expr(fl, &mut cond_sink, test)?;
            let body = lower_stmts(fl, body)?;
            if cond_sink.is_empty() {
                sink.push(Statement::ForLoop {
                    pre: vec![],
                    condition: cond,
                    post: vec![],
                    body,
                });
            } else {
                // re-run the side effects each iteration, then break on the
                // stored result
                let flag = fl.ctx.new_ir_variable();
                let mut header = vec![Statement::VariableDeclaration {
                    names: vec![flag.clone()],
                    value: None,
                }];
                let mut loop_body = cond_sink;
                loop_body.push(Statement::Assignment {
                    name: flag.clone(),
                    value: cond,
                });
                loop_body.push(Statement::If {
                    condition: Expression::call("iszero", vec![Expression::id(&flag)]),
                    body: vec![Statement::Break],
                });
                loop_body.extend(body);
                header.push(Statement::ForLoop {
                    pre: vec![],
                    condition: Expression::lit("0x1"),
                    post: vec![],
                    body: loop_body,
                });
                sink.push(Statement::Block(header));
            }
        }
        FuncStmt::Return { value } => {
            if let Some(value) = value {
                let value = lower_expr(fl, sink, value)?;
                sink.push(Statement::Assignment {
                    name: "ret".to_string(),
                    value,
                });
            }
            sink.push(Statement::Leave);
        }
        FuncStmt::Break => sink.push(Statement::Break),
        FuncStmt::Continue => sink.push(Statement::Continue),
        FuncStmt::Expr { value } => {
            super::expressions::lower_call_stmt(fl, sink, value)?;
        }
        FuncStmt::Assembly { body } => {
            fl.ctx.set_inline_assembly_seen();
            let stmts = parse_assembly(body)?;
            sink.extend(stmts);
        }
    }
    Ok(())
}

fn lower_assignment(
    fl: &mut FnLowering<'_, '_>,
    sink: &mut Block,
    target: &Node<Expr>,
    value: Expression,
) -> CompileResult<()> {
    let binding = fl
        .analysis
        .get_binding(target.id)
        .expect("assignment target was not bound")
        .clone();
    match binding {
        Binding::Local(decl) => {
            let name = fl.ctx.local_variable(decl).name.clone();
            sink.push(Statement::Assignment { name, value });
        }
        Binding::StateVar(decl) => {
            let var = fl.state_var(decl);
            if var.immutable {
                // only reachable from constructors; the checker rejects
                // immutable writes elsewhere
                let offset = RESERVED_BASE + fl.ctx.immutable_memory_offset(decl);
                sink.push(Statement::Expression(Expression::call(
                    "mstore",
                    vec![Expression::dec(offset), value],
                )));
            } else {
                let (slot, byte_offset) = fl.ctx.storage_location_of_state_variable(decl);
                let update = fl.ctx.utils().update_storage(&var.typ, byte_offset);
                sink.push(Statement::Expression(Expression::call(
                    update,
                    vec![Expression::dec(slot as usize), value],
                )));
            }
        }
        _ => panic!("assignment to a non-variable survived type checking"),
    }
    Ok(())
}

/// Parse the contents of an `assembly { ... }` block. The accepted form is
/// a sequence of instruction calls over literals, names and nested calls.
fn parse_assembly(text: &str) -> CompileResult<Vec<Statement>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut pos = 0;
    let mut stmts = vec![];
    while pos < tokens.len() {
        let (expr, next) = parse_assembly_expr(&tokens, pos)?;
        stmts.push(Statement::Expression(expr));
        pos = next;
    }
    Ok(stmts)
}

fn parse_assembly_expr(tokens: &[&str], pos: usize) -> CompileResult<(Expression, usize)> {
    let tok = tokens
        .get(pos)
        .ok_or_else(|| CompileError::compiler("unexpected end of assembly block"))?;
    if tok.chars().next().map_or(false, |ch| ch.is_ascii_digit()) {
        return Ok((Expression::lit(*tok), pos + 1));
    }
    if !tok.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(CompileError::compiler(format!(
            "unexpected token `{}` in assembly block",
            tok
        )));
    }
    if tokens.get(pos + 1) != Some(&"(") {
        return Ok((Expression::id(*tok), pos + 1));
    }
    let mut args = vec![];
    let mut cursor = pos + 2;
    if tokens.get(cursor) == Some(&")") {
        return Ok((Expression::call(*tok, args), cursor + 1));
    }
    loop {
        let (arg, next) = parse_assembly_expr(tokens, cursor)?;
        args.push(arg);
        cursor = next;
        match tokens.get(cursor) {
            Some(&",") => cursor += 1,
            Some(&")") => return Ok((Expression::call(*tok, args), cursor + 1)),
            other => {
                return Err(CompileError::compiler(format!(
                    "expected `,` or `)` in assembly block, found {:?}",
                    other
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_assembly;

    #[test]
    fn parses_instruction_calls() {
        let stmts = parse_assembly("mstore ( 0 , 1 ) sstore ( 0 , mload ( 0 ) )").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn rejects_stray_tokens() {
        assert!(parse_assembly(") (").is_err());
    }
}
