use super::expressions::{check_assignable, expr_any, expr_value, FnContext};
use crate::context::{
    AnalysisContext, Binding, ContractAttributes, Declaration, ExpressionAttributes, GlobalContext,
};
use crate::errors::{AnalyzerResult, SemanticError};
use crate::namespace::scopes::BlockScope;
use crate::namespace::types::{self, Type};
use crate::traversal::types::resolve_type_desc;
use indexmap::IndexSet;
use pact_common::SourceLocation;
use pact_parser::ast::{self, Expr, FuncStmt, Visibility};
use pact_parser::node::Node;

/// Phase B, bodies: resolve local declaration types and bind every name
/// reference in this contract's own function bodies.
pub fn resolve_bodies(
    global: &GlobalContext,
    context: &mut AnalysisContext,
    attrs: &ContractAttributes,
    contract: &Node<ast::Contract>,
    source: &str,
) -> AnalyzerResult<()> {
    for func in contract.kind.functions() {
        if let Some(body) = &func.kind.body {
            let mut scope = BlockScope::function_scope();
            for param in &func.kind.params {
                // duplicate params were rejected during signature resolution
                let _ = scope.add_var(&param.kind.name.kind, param.id);
            }
            bind_stmts(global, context, attrs, &mut scope, body, source)?;
        }
    }
    Ok(())
}

fn bind_stmts(
    global: &GlobalContext,
    context: &mut AnalysisContext,
    attrs: &ContractAttributes,
    scope: &mut BlockScope<'_>,
    stmts: &[Node<FuncStmt>],
    source: &str,
) -> AnalyzerResult<()> {
    for stmt in stmts {
        match &stmt.kind {
            FuncStmt::VarDecl { decl, value } => {
                if let Some(value) = value {
                    bind_expr(global, context, attrs, scope, value, source)?;
                }
                let typ = resolve_type_desc(global, &decl.kind.typ, source)?;
                context.add_declaration(decl.id, typ);
                if scope.add_var(&decl.kind.name.kind, decl.id).is_err() {
                    return Err(SemanticError::declaration_error(
                        format!("variable `{}` already declared", decl.kind.name.kind),
                        SourceLocation::new(decl.kind.name.span, source),
                    ));
                }
            }
            FuncStmt::Assign { target, value } => {
                bind_expr(global, context, attrs, scope, target, source)?;
                bind_expr(global, context, attrs, scope, value, source)?;
            }
            FuncStmt::If {
                test,
                body,
                or_else,
            } => {
                bind_expr(global, context, attrs, scope, test, source)?;
                let mut body_scope = scope.child();
                bind_stmts(global, context, attrs, &mut body_scope, body, source)?;
                drop(body_scope);
                let mut else_scope = scope.child();
                bind_stmts(global, context, attrs, &mut else_scope, or_else, source)?;
            }
            FuncStmt::While { test, body } => {
                bind_expr(global, context, attrs, scope, test, source)?;
                let mut body_scope = scope.child();
                bind_stmts(global, context, attrs, &mut body_scope, body, source)?;
            }
            FuncStmt::Return { value } => {
                if let Some(value) = value {
                    bind_expr(global, context, attrs, scope, value, source)?;
                }
            }
            FuncStmt::Expr { value } => {
                bind_expr(global, context, attrs, scope, value, source)?;
            }
            FuncStmt::Break | FuncStmt::Continue | FuncStmt::Assembly { .. } => {}
        }
    }
    Ok(())
}

fn bind_expr(
    global: &GlobalContext,
    context: &mut AnalysisContext,
    attrs: &ContractAttributes,
    scope: &BlockScope<'_>,
    expr: &Node<Expr>,
    source: &str,
) -> AnalyzerResult<()> {
    match &expr.kind {
        Expr::Name(name) => {
            let binding = if let Some(decl) = scope.resolve(name) {
                Binding::Local(decl)
            } else if let Some(var) = attrs.variable(name) {
                Binding::StateVar(var.id)
            } else if let Some(sig) = attrs.functions.get(name) {
                Binding::Function(sig.id)
            } else if let Some(typ) = types::from_base_name(name) {
                Binding::TypeName(typ)
            } else {
                match global.resolve(name) {
                    Some(Declaration::Contract { id, .. }) => Binding::ContractRef(*id),
                    Some(Declaration::This { .. }) => Binding::This,
                    Some(Declaration::Super { .. }) => Binding::Super,
                    Some(Declaration::Magic(obj)) => Binding::Magic(*obj),
                    Some(Declaration::GlobalFunction(func)) => Binding::GlobalFunction(*func),
                    None => {
                        return Err(SemanticError::declaration_error(
                            format!("undeclared identifier `{}`", name),
                            SourceLocation::new(expr.span, source),
                        ));
                    }
                }
            };
            context.add_binding(expr.id, binding);
        }
        Expr::Attribute { value, .. } => {
            bind_expr(global, context, attrs, scope, value, source)?;
        }
        Expr::Call { func, args } => {
            bind_expr(global, context, attrs, scope, func, source)?;
            for arg in args {
                bind_expr(global, context, attrs, scope, arg, source)?;
            }
        }
        Expr::New { contract, args } => {
            match global.resolve(&contract.kind) {
                Some(Declaration::Contract { .. }) => {}
                _ => {
                    return Err(SemanticError::declaration_error(
                        format!("unknown contract `{}`", contract.kind),
                        SourceLocation::new(contract.span, source),
                    ));
                }
            }
            for arg in args {
                bind_expr(global, context, attrs, scope, arg, source)?;
            }
        }
        Expr::BinOperation { left, right, .. }
        | Expr::CompOperation { left, right, .. }
        | Expr::BoolOperation { left, right, .. } => {
            bind_expr(global, context, attrs, scope, left, source)?;
            bind_expr(global, context, attrs, scope, right, source)?;
        }
        Expr::UnaryOperation { operand, .. } => {
            bind_expr(global, context, attrs, scope, operand, source)?;
        }
        Expr::Num(_) | Expr::Bool(_) | Expr::Str(_) => {}
    }
    Ok(())
}

/// Phase C: re-walk the contract checking type requirements. Expression
/// types are computed and attributed here.
pub fn check_contract(
    context: &mut AnalysisContext,
    contract: &Node<ast::Contract>,
    source: &str,
) -> AnalyzerResult<()> {
    let attrs = context
        .get_contract(contract.id)
        .expect("contract was not resolved before type checking")
        .clone();

    for sig in &attrs.own_functions {
        // overriding must preserve the signature
        for (base_id, _) in attrs.linearized.iter().skip(1) {
            let base_attrs = context
                .get_contract(*base_id)
                .expect("base contract was not resolved");
            if let Some(base_sig) = base_attrs
                .own_functions
                .iter()
                .find(|base_sig| base_sig.name == sig.name)
            {
                if base_sig.param_types() != sig.param_types() || base_sig.returns != sig.returns {
                    return Err(SemanticError::type_error(
                        format!(
                            "override of `{}` changes the signature inherited from `{}`",
                            sig.name, base_sig.defined_in
                        ),
                        SourceLocation::new(contract.kind.name.span, source),
                    ));
                }
            }
        }

        // function-typed values have no external encoding
        if sig.visibility == Visibility::Public
            && sig
                .param_types()
                .iter()
                .chain(sig.returns.iter())
                .any(|typ| matches!(typ, Type::Function(_)))
        {
            return Err(SemanticError::type_error(
                format!(
                    "public function `{}` cannot take or return function values",
                    sig.name
                ),
                SourceLocation::new(contract.kind.name.span, source),
            ));
        }
    }

    let mut created: IndexSet<String> = IndexSet::new();
    for func in contract.kind.functions() {
        if let Some(body) = &func.kind.body {
            let sig = context
                .get_function(func.id)
                .expect("function was not resolved")
                .clone();
            let mut ctx = FnContext {
                context: &mut *context,
                attrs: &attrs,
                source,
                created: &mut created,
                sig: &sig,
                in_constructor: func.kind.is_constructor(),
                loop_depth: 0,
            };
            check_stmts(&mut ctx, body)?;
        }
    }

    context
        .get_contract_mut(contract.id)
        .expect("contract attributes vanished")
        .created_contracts
        .extend(created);
    Ok(())
}

fn check_stmts(ctx: &mut FnContext<'_>, stmts: &[Node<FuncStmt>]) -> AnalyzerResult<()> {
    for stmt in stmts {
        check_stmt(ctx, stmt)?;
    }
    Ok(())
}

fn check_stmt(ctx: &mut FnContext<'_>, stmt: &Node<FuncStmt>) -> AnalyzerResult<()> {
    match &stmt.kind {
        FuncStmt::VarDecl { decl, value } => {
            let typ = ctx
                .context
                .get_declaration(decl.id)
                .expect("local declaration was not resolved")
                .clone();
            if let Some(value) = value {
                let value_attrs = expr_value(ctx, value)?;
                check_assignable(&typ, &value_attrs, value.span, ctx.source)?;
            }
            Ok(())
        }
        FuncStmt::Assign { target, value } => {
            let target_typ = check_assign_target(ctx, target)?;
            let value_attrs = expr_value(ctx, value)?;
            check_assignable(&target_typ, &value_attrs, value.span, ctx.source)
        }
        FuncStmt::If {
            test,
            body,
            or_else,
        } => {
            check_test(ctx, test)?;
            check_stmts(ctx, body)?;
            check_stmts(ctx, or_else)
        }
        FuncStmt::While { test, body } => {
            check_test(ctx, test)?;
            ctx.loop_depth += 1;
            let result = check_stmts(ctx, body);
            ctx.loop_depth -= 1;
            result
        }
        FuncStmt::Return { value } => match (&ctx.sig.returns.first(), value) {
            (None, None) => Ok(()),
            (None, Some(value)) => Err(SemanticError::type_error(
                "function does not return a value",
                SourceLocation::new(value.span, ctx.source),
            )),
            (Some(_), None) => Err(SemanticError::type_error(
                "missing return value",
                SourceLocation::new(stmt.span, ctx.source),
            )),
            (Some(expected), Some(value)) => {
                let expected = (*expected).clone();
                let value_attrs = expr_value(ctx, value)?;
                check_assignable(&expected, &value_attrs, value.span, ctx.source)
            }
        },
        FuncStmt::Break | FuncStmt::Continue => {
            if ctx.loop_depth == 0 {
                return Err(SemanticError::type_error(
                    "`break`/`continue` outside of a loop",
                    SourceLocation::new(stmt.span, ctx.source),
                ));
            }
            Ok(())
        }
        FuncStmt::Expr { value } => {
            expr_any(ctx, value)?;
            Ok(())
        }
        FuncStmt::Assembly { .. } => Ok(()),
    }
}

fn check_test(ctx: &mut FnContext<'_>, test: &Node<Expr>) -> AnalyzerResult<()> {
    let attrs = expr_value(ctx, test)?;
    if attrs.typ != Type::Bool {
        return Err(SemanticError::type_error(
            format!("condition has type `{}`; expected `bool`", attrs.typ),
            SourceLocation::new(test.span, ctx.source),
        ));
    }
    Ok(())
}

/// Type an assignment target and enforce write rules: locals and state
/// variables are assignable; immutables only inside a constructor.
fn check_assign_target(ctx: &mut FnContext<'_>, target: &Node<Expr>) -> AnalyzerResult<Type> {
    let binding = match &target.kind {
        Expr::Name(_) => ctx
            .context
            .get_binding(target.id)
            .expect("assignment target was not bound")
            .clone(),
        _ => {
            return Err(SemanticError::type_error(
                "expression is not assignable",
                SourceLocation::new(target.span, ctx.source),
            ));
        }
    };

    let typ = match binding {
        Binding::Local(decl) => ctx
            .context
            .get_declaration(decl)
            .expect("local declaration was not resolved")
            .clone(),
        Binding::StateVar(decl) => {
            let var = ctx
                .attrs
                .variables
                .iter()
                .find(|var| var.id == decl)
                .expect("state variable was not resolved")
                .clone();
            if var.immutable && !ctx.in_constructor {
                return Err(SemanticError::type_error(
                    format!(
                        "immutable `{}` can only be assigned in a constructor",
                        var.name
                    ),
                    SourceLocation::new(target.span, ctx.source),
                ));
            }
            var.typ
        }
        _ => {
            return Err(SemanticError::type_error(
                "expression is not assignable",
                SourceLocation::new(target.span, ctx.source),
            ));
        }
    };

    ctx.context
        .add_expression(target.id, ExpressionAttributes::new(typ.clone()));
    Ok(typ)
}
