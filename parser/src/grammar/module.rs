use super::contracts::parse_contract_def;
use crate::ast::{Import, Module, ModuleStmt};
use crate::node::Node;
use crate::token::TokenKind;
use crate::{ParseResult, Parser};
use pact_common::Span;

/// Parse a source unit: any number of imports and contract definitions.
pub fn parse_module(par: &mut Parser) -> ParseResult<Node<Module>> {
    let mut body = vec![];
    let mut span: Option<Span> = None;

    loop {
        let doc = par.eat_docs();
        let stmt_span = match par.peek() {
            Some(TokenKind::Import) => {
                let import = parse_import(par)?;
                let stmt_span = import.span;
                body.push(ModuleStmt::Import(import));
                stmt_span
            }
            Some(TokenKind::Contract) => {
                let contract = parse_contract_def(par, doc)?;
                let stmt_span = contract.span;
                body.push(ModuleStmt::Contract(contract));
                stmt_span
            }
            Some(_) => {
                let tok = par.next()?;
                return Err(par.error(
                    tok.span,
                    format!(
                        "failed to parse source unit: expected `import` or `contract`, found {}",
                        tok.kind.describe()
                    ),
                ));
            }
            None => break,
        };
        span = Some(match span {
            Some(span) => span.join(stmt_span),
            None => stmt_span,
        });
    }

    Ok(Node::new(Module { body }, span.unwrap_or_else(Span::empty)))
}

/// Parse `import "<source name>";`.
pub fn parse_import(par: &mut Parser) -> ParseResult<Node<Import>> {
    let import_tok = par.expect(TokenKind::Import, "import directive")?;
    let name_tok = par.expect(TokenKind::Str, "import directive")?;
    let semi = par.expect(TokenKind::Semi, "import directive")?;

    let span = import_tok.span + semi.span;
    Ok(Node::new(
        Import {
            name: Node::new(name_tok.text, name_tok.span),
        },
        span,
    ))
}
