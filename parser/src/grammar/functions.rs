use super::expressions::parse_expr;
use super::types::parse_type_desc;
use crate::ast::{FuncStmt, Function, VariableDeclaration, Visibility};
use crate::node::Node;
use crate::token::TokenKind;
use crate::{ParseResult, Parser};
use pact_common::Span;

/// Parse a function or constructor definition.
pub fn parse_fn_def(par: &mut Parser, doc: Option<String>) -> ParseResult<Node<Function>> {
    let (start_tok, name) = if par.peek() == Some(TokenKind::Constructor) {
        (par.next()?, None)
    } else {
        let fn_tok = par.expect(TokenKind::Function, "function definition")?;
        let name_tok = par.expect(TokenKind::Name, "function definition")?;
        (fn_tok, Some(Node::new(name_tok.text, name_tok.span)))
    };

    par.expect(TokenKind::ParenOpen, "function parameter list")?;
    let params = parse_params(par)?;
    par.expect(TokenKind::ParenClose, "function parameter list")?;

    let visibility = match par.peek() {
        Some(TokenKind::Public) => {
            par.next()?;
            Visibility::Public
        }
        Some(TokenKind::Internal) => {
            par.next()?;
            Visibility::Internal
        }
        Some(TokenKind::Private) => {
            par.next()?;
            Visibility::Private
        }
        _ => Visibility::Public,
    };

    let mut returns = vec![];
    if par.eat(TokenKind::Returns).is_some() {
        par.expect(TokenKind::ParenOpen, "function return list")?;
        loop {
            returns.push(parse_type_desc(par)?);
            if par.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        par.expect(TokenKind::ParenClose, "function return list")?;
    }

    let (body, end_span) = match par.peek() {
        Some(TokenKind::Semi) => {
            let semi = par.next()?;
            (None, semi.span)
        }
        _ => {
            let (stmts, span) = parse_block(par)?;
            (Some(stmts), span)
        }
    };

    let span = start_tok.span + end_span;
    Ok(Node::new(
        Function {
            name,
            params,
            returns,
            visibility,
            body,
            doc,
        },
        span,
    ))
}

fn parse_params(par: &mut Parser) -> ParseResult<Vec<Node<VariableDeclaration>>> {
    let mut params = vec![];
    if par.peek() == Some(TokenKind::ParenClose) {
        return Ok(params);
    }
    loop {
        let typ = parse_type_desc(par)?;
        let name_tok = par.expect(TokenKind::Name, "function parameter")?;
        let span = typ.span + name_tok.span;
        params.push(Node::new(
            VariableDeclaration {
                typ,
                name: Node::new(name_tok.text, name_tok.span),
                immutable: false,
            },
            span,
        ));
        if par.eat(TokenKind::Comma).is_none() {
            break;
        }
    }
    Ok(params)
}

/// Parse `{ <stmt>* }`, returning the statements and the block's span.
pub fn parse_block(par: &mut Parser) -> ParseResult<(Vec<Node<FuncStmt>>, Span)> {
    let open = par.expect(TokenKind::BraceOpen, "block")?;
    let mut stmts = vec![];
    loop {
        if par.peek() == Some(TokenKind::BraceClose) {
            let close = par.next()?;
            return Ok((stmts, open.span + close.span));
        }
        stmts.push(parse_stmt(par)?);
    }
}

/// A statement body: either a braced block or a single statement.
fn parse_body(par: &mut Parser) -> ParseResult<Vec<Node<FuncStmt>>> {
    if par.peek() == Some(TokenKind::BraceOpen) {
        Ok(parse_block(par)?.0)
    } else {
        Ok(vec![parse_stmt(par)?])
    }
}

pub fn parse_stmt(par: &mut Parser) -> ParseResult<Node<FuncStmt>> {
    match par.peek() {
        Some(TokenKind::If) => {
            let if_tok = par.next()?;
            par.expect(TokenKind::ParenOpen, "if statement condition")?;
            let test = parse_expr(par)?;
            par.expect(TokenKind::ParenClose, "if statement condition")?;
            let body = parse_body(par)?;
            let or_else = if par.eat(TokenKind::Else).is_some() {
                parse_body(par)?
            } else {
                vec![]
            };
            let end = or_else
                .last()
                .or_else(|| body.last())
                .map(|stmt| stmt.span)
                .unwrap_or(if_tok.span);
            Ok(Node::new(FuncStmt::If { test, body, or_else }, if_tok.span + end))
        }
        Some(TokenKind::While) => {
            let while_tok = par.next()?;
            par.expect(TokenKind::ParenOpen, "while statement condition")?;
            let test = parse_expr(par)?;
            par.expect(TokenKind::ParenClose, "while statement condition")?;
            let body = parse_body(par)?;
            let end = body.last().map(|stmt| stmt.span).unwrap_or(while_tok.span);
            Ok(Node::new(FuncStmt::While { test, body }, while_tok.span + end))
        }
        Some(TokenKind::Return) => {
            let ret_tok = par.next()?;
            let value = if par.peek() == Some(TokenKind::Semi) {
                None
            } else {
                Some(parse_expr(par)?)
            };
            let semi = par.expect(TokenKind::Semi, "return statement")?;
            Ok(Node::new(FuncStmt::Return { value }, ret_tok.span + semi.span))
        }
        Some(TokenKind::Break) => {
            let tok = par.next()?;
            let semi = par.expect(TokenKind::Semi, "break statement")?;
            Ok(Node::new(FuncStmt::Break, tok.span + semi.span))
        }
        Some(TokenKind::Continue) => {
            let tok = par.next()?;
            let semi = par.expect(TokenKind::Semi, "continue statement")?;
            Ok(Node::new(FuncStmt::Continue, tok.span + semi.span))
        }
        Some(TokenKind::Assembly) => parse_assembly(par),
        _ if is_decl_start(par) => {
            let typ = parse_type_desc(par)?;
            let name_tok = par.expect(TokenKind::Name, "variable declaration")?;
            let decl_span = typ.span + name_tok.span;
            let decl = Node::new(
                VariableDeclaration {
                    typ,
                    name: Node::new(name_tok.text, name_tok.span),
                    immutable: false,
                },
                decl_span,
            );
            let value = if par.eat(TokenKind::Eq).is_some() {
                Some(parse_expr(par)?)
            } else {
                None
            };
            let semi = par.expect(TokenKind::Semi, "variable declaration")?;
            Ok(Node::new(
                FuncStmt::VarDecl { decl, value },
                decl_span + semi.span,
            ))
        }
        _ => {
            let target = parse_expr(par)?;
            if par.eat(TokenKind::Eq).is_some() {
                let value = parse_expr(par)?;
                let semi = par.expect(TokenKind::Semi, "assignment")?;
                let span = target.span + semi.span;
                Ok(Node::new(FuncStmt::Assign { target, value }, span))
            } else {
                let semi = par.expect(TokenKind::Semi, "expression statement")?;
                let span = target.span + semi.span;
                Ok(Node::new(FuncStmt::Expr { value: target }, span))
            }
        }
    }
}

/// A statement opens a local declaration when it starts with a type: either
/// `function(` (a function type) or two adjacent names (`uint256 x`).
fn is_decl_start(par: &Parser) -> bool {
    match par.peek() {
        Some(TokenKind::Function) => par.peek_ahead(1) == Some(TokenKind::ParenOpen),
        Some(TokenKind::Name) => par.peek_ahead(1) == Some(TokenKind::Name),
        _ => false,
    }
}

/// Collect the raw token text of an `assembly { ... }` block. The content is
/// carried through to the IR verbatim.
fn parse_assembly(par: &mut Parser) -> ParseResult<Node<FuncStmt>> {
    let asm_tok = par.expect(TokenKind::Assembly, "assembly block")?;
    par.expect(TokenKind::BraceOpen, "assembly block")?;

    let mut depth = 1usize;
    let mut pieces: Vec<String> = vec![];
    let end_span;
    loop {
        let tok = par.next().map_err(|_| {
            par.error(asm_tok.span, "failed to parse assembly block: missing closing brace")
        })?;
        match tok.kind {
            TokenKind::BraceOpen => depth += 1,
            TokenKind::BraceClose => {
                depth -= 1;
                if depth == 0 {
                    end_span = tok.span;
                    break;
                }
            }
            _ => {}
        }
        if depth > 0 {
            let text = match tok.kind {
                TokenKind::Str => format!("\"{}\"", tok.text),
                _ => tok.text,
            };
            pieces.push(text);
        }
    }

    Ok(Node::new(
        FuncStmt::Assembly {
            body: pieces.join(" "),
        },
        asm_tok.span + end_span,
    ))
}
