use super::functions::parse_fn_def;
use super::types::parse_type_desc;
use crate::ast::{Contract, ContractStmt, VariableDeclaration};
use crate::node::Node;
use crate::token::TokenKind;
use crate::{ParseResult, Parser};

/// Parse a contract definition.
///
/// # Panics
///
/// Panics if the next token isn't `contract`.
pub fn parse_contract_def(par: &mut Parser, doc: Option<String>) -> ParseResult<Node<Contract>> {
    let contract_tok = par.expect(TokenKind::Contract, "contract definition")?;
    let name_tok = par.expect(TokenKind::Name, "contract definition")?;

    let mut bases = vec![];
    if par.eat(TokenKind::Is).is_some() {
        loop {
            let base = par.expect(TokenKind::Name, "contract inheritance list")?;
            bases.push(Node::new(base.text, base.span));
            if par.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
    }

    par.expect(TokenKind::BraceOpen, "contract definition")?;

    let mut body = vec![];
    loop {
        let member_doc = par.eat_docs();
        match par.peek() {
            Some(TokenKind::BraceClose) => {
                let close = par.next()?;
                let span = contract_tok.span + close.span;
                return Ok(Node::new(
                    Contract {
                        name: Node::new(name_tok.text, name_tok.span),
                        bases,
                        body,
                        doc,
                    },
                    span,
                ));
            }
            Some(TokenKind::Function) | Some(TokenKind::Constructor)
                if !is_function_type_start(par) =>
            {
                body.push(ContractStmt::Function(parse_fn_def(par, member_doc)?));
            }
            Some(_) => {
                body.push(ContractStmt::Variable(parse_state_variable(par)?));
            }
            None => {
                return Err(par.error(
                    name_tok.span,
                    "failed to parse contract definition: missing closing brace",
                ))
            }
        }
    }
}

/// A `function` token opens a function-typed state variable when it is
/// directly followed by `(` rather than a name.
fn is_function_type_start(par: &Parser) -> bool {
    par.peek() == Some(TokenKind::Function) && par.peek_ahead(1) == Some(TokenKind::ParenOpen)
}

/// Parse `<type> [immutable] <name>;`.
fn parse_state_variable(par: &mut Parser) -> ParseResult<Node<VariableDeclaration>> {
    let typ = parse_type_desc(par)?;
    let immutable = par.eat(TokenKind::Immutable).is_some();
    let name_tok = par.expect(TokenKind::Name, "state variable declaration")?;
    let semi = par.expect(TokenKind::Semi, "state variable declaration")?;

    let span = typ.span + semi.span;
    Ok(Node::new(
        VariableDeclaration {
            typ,
            name: Node::new(name_tok.text, name_tok.span),
            immutable,
        },
        span,
    ))
}
