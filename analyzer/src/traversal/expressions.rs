use crate::builtins::{BlockField, GlobalFunction, MsgField, Object};
use crate::context::{
    AnalysisContext, Binding, CallType, ContractAttributes, ExpressionAttributes,
};
use crate::errors::{AnalyzerResult, SemanticError};
use crate::namespace::types::{ContractType, FunctionSig, Type};
use indexmap::IndexSet;
use pact_common::numeric;
use pact_common::{SourceLocation, Span};
use pact_parser::ast::{CompOperator, Expr, UnaryOperator};
use pact_parser::node::Node;
use std::str::FromStr;

/// Checking state for one function body.
pub struct FnContext<'a> {
    pub context: &'a mut AnalysisContext,
    pub attrs: &'a ContractAttributes,
    pub source: &'a str,
    pub created: &'a mut IndexSet<String>,
    pub sig: &'a FunctionSig,
    pub in_constructor: bool,
    pub loop_depth: usize,
}

impl<'a> FnContext<'a> {
    fn error(&self, message: impl Into<String>, span: Span) -> SemanticError {
        SemanticError::type_error(message, SourceLocation::new(span, self.source))
    }
}

/// Type an expression that must produce a value.
pub fn expr_value(ctx: &mut FnContext<'_>, expr: &Node<Expr>) -> AnalyzerResult<ExpressionAttributes> {
    match expr_any(ctx, expr)? {
        Some(attrs) => Ok(attrs),
        None => Err(ctx.error("expression does not produce a value", expr.span)),
    }
}

/// Type an expression; calls of functions without return values produce
/// `None`.
pub fn expr_any(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
) -> AnalyzerResult<Option<ExpressionAttributes>> {
    let attributes = match &expr.kind {
        Expr::Num(text) => {
            if numeric::Literal::new(text).parse_word().is_none() {
                return Err(ctx.error(
                    format!("number literal `{}` does not fit in 256 bits", text),
                    expr.span,
                ));
            }
            Some(ExpressionAttributes::literal(Type::Uint))
        }
        Expr::Bool(_) => Some(ExpressionAttributes::new(Type::Bool)),
        Expr::Str(_) => {
            return Err(ctx.error(
                "string literals can only be used as revert messages",
                expr.span,
            ));
        }
        Expr::Name(name) => Some(name_attributes(ctx, expr, name)?),
        Expr::Attribute { value, attr } => Some(attribute_value(ctx, expr, value, attr)?),
        Expr::UnaryOperation { op, operand } => {
            let operand_attrs = expr_value(ctx, operand)?;
            let expected = match op.kind {
                UnaryOperator::Not => Type::Bool,
                UnaryOperator::USub => Type::Uint,
            };
            if operand_attrs.typ != expected {
                return Err(ctx.error(
                    format!(
                        "operator cannot be applied to a value of type `{}`",
                        operand_attrs.typ
                    ),
                    operand.span,
                ));
            }
            Some(ExpressionAttributes::new(expected))
        }
        Expr::BinOperation { left, op, right } => {
            let left_attrs = expr_value(ctx, left)?;
            let right_attrs = expr_value(ctx, right)?;
            for (attrs, node) in [(&left_attrs, left), (&right_attrs, right)] {
                if attrs.typ != Type::Uint {
                    return Err(ctx.error(
                        format!(
                            "arithmetic requires `uint256` operands, found `{}`",
                            attrs.typ
                        ),
                        node.span,
                    ));
                }
            }
            Some(ExpressionAttributes::new(Type::Uint))
        }
        Expr::CompOperation { left, op, right } => {
            let left_attrs = expr_value(ctx, left)?;
            let right_attrs = expr_value(ctx, right)?;
            let compatible = left_attrs.typ.assignable_from(&right_attrs.typ)
                || right_attrs.typ.assignable_from(&left_attrs.typ)
                || (left_attrs.literal || right_attrs.literal)
                    && (left_attrs.typ == Type::Uint || right_attrs.typ == Type::Uint);
            if !compatible || matches!(left_attrs.typ, Type::Function(_)) {
                return Err(ctx.error(
                    format!(
                        "cannot compare `{}` with `{}`",
                        left_attrs.typ, right_attrs.typ
                    ),
                    expr.span,
                ));
            }
            let ordered = matches!(
                op.kind,
                CompOperator::Lt | CompOperator::LtE | CompOperator::Gt | CompOperator::GtE
            );
            if ordered && left_attrs.typ != Type::Uint {
                return Err(ctx.error(
                    format!("values of type `{}` are not ordered", left_attrs.typ),
                    expr.span,
                ));
            }
            Some(ExpressionAttributes::new(Type::Bool))
        }
        Expr::BoolOperation { left, right, .. } => {
            for node in [left, right] {
                let attrs = expr_value(ctx, node)?;
                if attrs.typ != Type::Bool {
                    return Err(ctx.error(
                        format!("logical operand has type `{}`; expected `bool`", attrs.typ),
                        node.span,
                    ));
                }
            }
            Some(ExpressionAttributes::new(Type::Bool))
        }
        Expr::New { contract, args } => Some(new_contract(ctx, expr, contract, args)?),
        Expr::Call { func, args } => call(ctx, expr, func, args)?,
    };

    if let Some(attrs) = &attributes {
        // `Name` and `Attribute` handlers attribute their own nodes
        if !matches!(&expr.kind, Expr::Name(_) | Expr::Attribute { .. }) {
            ctx.context.add_expression(expr.id, attrs.clone());
        }
    }
    Ok(attributes)
}

fn name_attributes(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    name: &str,
) -> AnalyzerResult<ExpressionAttributes> {
    let binding = ctx
        .context
        .get_binding(expr.id)
        .expect("name was not bound during resolution")
        .clone();

    let attrs = match binding {
        Binding::Local(decl) => ExpressionAttributes::new(
            ctx.context
                .get_declaration(decl)
                .expect("local declaration was not resolved")
                .clone(),
        ),
        Binding::StateVar(decl) => {
            let var = ctx
                .attrs
                .variables
                .iter()
                .find(|var| var.id == decl)
                .expect("state variable was not resolved");
            ExpressionAttributes::new(var.typ.clone())
        }
        Binding::Function(id) => {
            let sig = function_sig(ctx, id);
            check_function_accessible(ctx, &sig, expr.span)?;
            ExpressionAttributes::new(Type::Function(sig.function_type()))
        }
        Binding::ContractRef(id) => {
            let target = ctx
                .context
                .get_contract(id)
                .expect("referenced contract was not resolved");
            ExpressionAttributes::new(Type::Contract(ContractType {
                id,
                name: target.name.clone(),
            }))
        }
        Binding::This => ExpressionAttributes::new(Type::Contract(ContractType {
            id: ctx.attrs.id,
            name: ctx.attrs.name.clone(),
        })),
        Binding::Super => {
            return Err(ctx.error("`super` can only be used in member calls", expr.span));
        }
        Binding::Magic(_) => {
            return Err(ctx.error(
                format!("built-in object `{}` cannot be used as a value", name),
                expr.span,
            ));
        }
        Binding::GlobalFunction(_) => {
            return Err(ctx.error(
                format!("built-in function `{}` must be called", name),
                expr.span,
            ));
        }
        Binding::TypeName(_) => {
            return Err(ctx.error(
                format!("type `{}` cannot be used as a value", name),
                expr.span,
            ));
        }
    };

    ctx.context.add_expression(expr.id, attrs.clone());
    Ok(attrs)
}

fn attribute_value(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    value: &Node<Expr>,
    attr: &Node<String>,
) -> AnalyzerResult<ExpressionAttributes> {
    if let Expr::Name(_) = &value.kind {
        if let Some(Binding::Magic(obj)) = ctx.context.get_binding(value.id).cloned() {
            let typ = match obj {
                Object::Msg => match MsgField::from_str(&attr.kind) {
                    Ok(MsgField::Sender) => Type::Address,
                    Ok(MsgField::Value) => Type::Uint,
                    Err(_) => {
                        return Err(ctx.error(
                            format!("`msg` has no member `{}`", attr.kind),
                            attr.span,
                        ));
                    }
                },
                Object::Block => match BlockField::from_str(&attr.kind) {
                    Ok(BlockField::Number) | Ok(BlockField::Timestamp) => Type::Uint,
                    Err(_) => {
                        return Err(ctx.error(
                            format!("`block` has no member `{}`", attr.kind),
                            attr.span,
                        ));
                    }
                },
            };
            let attrs = ExpressionAttributes::new(typ);
            ctx.context.add_expression(expr.id, attrs.clone());
            return Ok(attrs);
        }
    }
    Err(ctx.error("expression has no such member", expr.span))
}

fn new_contract(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    contract: &Node<String>,
    args: &[Node<Expr>],
) -> AnalyzerResult<ExpressionAttributes> {
    let target = ctx
        .context
        .contract_by_name(&contract.kind)
        .expect("created contract was not resolved")
        .clone();
    if target.id == ctx.attrs.id {
        return Err(ctx.error(
            "a contract cannot create an instance of itself",
            contract.span,
        ));
    }
    if !target.fully_implemented {
        return Err(ctx.error(
            format!("cannot create an instance of abstract contract `{}`", contract.kind),
            contract.span,
        ));
    }

    // constructor parameters come from the created contract's own
    // constructor, if any; base constructors are parameterless
    let params = target
        .constructors
        .iter()
        .filter_map(|ctor| ctx.context.get_function(*ctor))
        .find(|sig| sig.defined_in == target.name)
        .map(|sig| sig.param_types())
        .unwrap_or_default();
    check_args(ctx, &params, args, expr.span)?;

    ctx.context
        .add_call(expr.id, CallType::Create { contract: target.id });
    ctx.created.insert(target.name.clone());

    Ok(ExpressionAttributes::new(Type::Contract(ContractType {
        id: target.id,
        name: target.name,
    })))
}

fn call(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    func: &Node<Expr>,
    args: &[Node<Expr>],
) -> AnalyzerResult<Option<ExpressionAttributes>> {
    // `super.f(...)`
    if let Expr::Attribute { value, attr } = &func.kind {
        if matches!(ctx.context.get_binding(value.id), Some(Binding::Super)) {
            return super_call(ctx, expr, attr, args);
        }
        return Err(ctx.error("expression is not callable", func.span));
    }

    let binding = match &func.kind {
        Expr::Name(_) => ctx
            .context
            .get_binding(func.id)
            .expect("callee was not bound during resolution")
            .clone(),
        _ => return Err(ctx.error("expression is not callable", func.span)),
    };

    match binding {
        Binding::GlobalFunction(global_fn) => {
            builtin_call(ctx, expr, global_fn, args)?;
            Ok(None)
        }
        Binding::TypeName(typ) => {
            let result = conversion(ctx, expr, typ, args)?;
            Ok(Some(result))
        }
        Binding::ContractRef(id) => {
            let target = ctx
                .context
                .get_contract(id)
                .expect("referenced contract was not resolved");
            let typ = Type::Contract(ContractType {
                id,
                name: target.name.clone(),
            });
            let result = conversion(ctx, expr, typ, args)?;
            Ok(Some(result))
        }
        Binding::Function(id) => {
            let sig = function_sig(ctx, id);
            check_function_accessible(ctx, &sig, func.span)?;
            check_args(ctx, &sig.param_types(), args, expr.span)?;
            ctx.context
                .add_call(expr.id, CallType::Internal { function: id });
            Ok(sig
                .returns
                .first()
                .map(|typ| ExpressionAttributes::new(typ.clone())))
        }
        Binding::Local(_) | Binding::StateVar(_) => {
            let callee = expr_value(ctx, func)?;
            let Type::Function(fn_typ) = callee.typ else {
                return Err(ctx.error("expression is not callable", func.span));
            };
            check_args(ctx, &fn_typ.params, args, expr.span)?;
            ctx.context.add_call(
                expr.id,
                CallType::ViaPointer {
                    params: fn_typ.params.len(),
                    returns: fn_typ.returns.len(),
                },
            );
            Ok(fn_typ
                .returns
                .first()
                .map(|typ| ExpressionAttributes::new(typ.clone())))
        }
        _ => Err(ctx.error("expression is not callable", func.span)),
    }
}

fn super_call(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    attr: &Node<String>,
    args: &[Node<Expr>],
) -> AnalyzerResult<Option<ExpressionAttributes>> {
    for (base_id, _) in ctx.attrs.linearized.iter().skip(1) {
        let base_attrs = ctx
            .context
            .get_contract(*base_id)
            .expect("base contract was not resolved");
        if let Some(sig) = base_attrs
            .own_functions
            .iter()
            .find(|sig| sig.name == attr.kind)
        {
            let sig = sig.clone();
            check_function_accessible(ctx, &sig, attr.span)?;
            check_args(ctx, &sig.param_types(), args, expr.span)?;
            ctx.context
                .add_call(expr.id, CallType::Super { function: sig.id });
            return Ok(sig
                .returns
                .first()
                .map(|typ| ExpressionAttributes::new(typ.clone())));
        }
    }
    Err(ctx.error(
        format!("no base contract defines `{}`", attr.kind),
        attr.span,
    ))
}

fn builtin_call(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    func: GlobalFunction,
    args: &[Node<Expr>],
) -> AnalyzerResult<()> {
    match func {
        GlobalFunction::Require => {
            if args.is_empty() || args.len() > 2 {
                return Err(ctx.error("`require` takes a condition and an optional message", expr.span));
            }
            let cond = expr_value(ctx, &args[0])?;
            if cond.typ != Type::Bool {
                return Err(ctx.error(
                    format!("`require` condition has type `{}`; expected `bool`", cond.typ),
                    args[0].span,
                ));
            }
            if let Some(message) = args.get(1) {
                require_string_literal(ctx, message)?;
            }
        }
        GlobalFunction::Revert => {
            if args.len() > 1 {
                return Err(ctx.error("`revert` takes at most a message", expr.span));
            }
            if let Some(message) = args.first() {
                require_string_literal(ctx, message)?;
            }
        }
        GlobalFunction::Selfdestruct => {
            if args.len() != 1 {
                return Err(ctx.error("`selfdestruct` takes a beneficiary address", expr.span));
            }
            let target = expr_value(ctx, &args[0])?;
            if !Type::Address.assignable_from(&target.typ) {
                return Err(ctx.error(
                    format!("`selfdestruct` beneficiary has type `{}`", target.typ),
                    args[0].span,
                ));
            }
        }
    }
    ctx.context
        .add_call(expr.id, CallType::BuiltinFunction { func });
    Ok(())
}

fn require_string_literal(ctx: &FnContext<'_>, node: &Node<Expr>) -> AnalyzerResult<()> {
    match &node.kind {
        Expr::Str(_) => Ok(()),
        _ => Err(SemanticError::type_error(
            "revert message must be a string literal",
            SourceLocation::new(node.span, ctx.source),
        )),
    }
}

/// Explicit conversions: `address(x)`, `uint(x)`, `bytesN(x)` and contract
/// casts `C(x)`.
fn conversion(
    ctx: &mut FnContext<'_>,
    expr: &Node<Expr>,
    target: Type,
    args: &[Node<Expr>],
) -> AnalyzerResult<ExpressionAttributes> {
    if args.len() != 1 {
        return Err(ctx.error("type conversion takes exactly one argument", expr.span));
    }
    let operand = expr_value(ctx, &args[0])?;

    let allowed = match (&target, &operand.typ) {
        (Type::Address, Type::Uint | Type::Address | Type::Contract(_) | Type::Bytes(20)) => true,
        (Type::Uint, Type::Uint | Type::Address | Type::Bytes(_) | Type::Bool) => true,
        (Type::Bytes(_), Type::Uint) => true,
        (Type::Bytes(left), Type::Bytes(right)) => left == right,
        (Type::Contract(_), Type::Address | Type::Uint | Type::Contract(_)) => true,
        _ => false,
    };
    if !allowed {
        return Err(ctx.error(
            format!("cannot convert `{}` to `{}`", operand.typ, target),
            expr.span,
        ));
    }

    ctx.context.add_call(
        expr.id,
        CallType::TypeConstructor {
            typ: target.clone(),
        },
    );
    Ok(ExpressionAttributes::new(target))
}

fn check_args(
    ctx: &mut FnContext<'_>,
    params: &[Type],
    args: &[Node<Expr>],
    span: Span,
) -> AnalyzerResult<()> {
    if params.len() != args.len() {
        return Err(ctx.error(
            format!("expected {} argument(s), found {}", params.len(), args.len()),
            span,
        ));
    }
    for (param, arg) in params.iter().zip(args) {
        let attrs = expr_value(ctx, arg)?;
        check_assignable(param, &attrs, arg.span, ctx.source)?;
    }
    Ok(())
}

fn function_sig(ctx: &FnContext<'_>, id: pact_parser::NodeId) -> FunctionSig {
    ctx.context
        .get_function(id)
        .expect("function was not resolved")
        .clone()
}

fn check_function_accessible(
    ctx: &FnContext<'_>,
    sig: &FunctionSig,
    span: Span,
) -> AnalyzerResult<()> {
    if sig.visibility == pact_parser::ast::Visibility::Private && sig.defined_in != ctx.attrs.name {
        return Err(SemanticError::type_error(
            format!(
                "`{}` is private to contract `{}`",
                sig.name, sig.defined_in
            ),
            SourceLocation::new(span, ctx.source),
        ));
    }
    Ok(())
}

/// Whether `actual` can be used where `expected` is required, including
/// the free conversions granted to number literals.
pub fn check_assignable(
    expected: &Type,
    actual: &ExpressionAttributes,
    span: Span,
    source: &str,
) -> AnalyzerResult<()> {
    if expected.assignable_from(&actual.typ) {
        return Ok(());
    }
    if actual.literal
        && actual.typ == Type::Uint
        && matches!(expected, Type::Address | Type::Bytes(_))
    {
        return Ok(());
    }
    Err(SemanticError::type_error(
        format!("expected `{}`, found `{}`", expected, actual.typ),
        SourceLocation::new(span, source),
    ))
}
