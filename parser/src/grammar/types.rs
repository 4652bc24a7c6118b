use crate::ast::TypeDesc;
use crate::node::Node;
use crate::token::TokenKind;
use crate::{ParseResult, Parser};

/// Parse a type description: a base name (`uint256`, `bool`, `address`,
/// `bytes32`, a contract name) or a function type
/// `function(<types>) returns (<types>)`.
pub fn parse_type_desc(par: &mut Parser) -> ParseResult<Node<TypeDesc>> {
    if par.peek() == Some(TokenKind::Function) {
        let fn_tok = par.next()?;
        par.expect(TokenKind::ParenOpen, "function type")?;
        let params = parse_type_list(par, TokenKind::ParenClose)?;
        let mut close = par.expect(TokenKind::ParenClose, "function type")?;

        let mut returns = vec![];
        if par.eat(TokenKind::Returns).is_some() {
            par.expect(TokenKind::ParenOpen, "function type return list")?;
            returns = parse_type_list(par, TokenKind::ParenClose)?;
            close = par.expect(TokenKind::ParenClose, "function type return list")?;
        }

        let span = fn_tok.span + close.span;
        return Ok(Node::new(TypeDesc::Function { params, returns }, span));
    }

    let name_tok = par.expect(TokenKind::Name, "type description")?;
    Ok(Node::new(
        TypeDesc::Base {
            base: name_tok.text,
        },
        name_tok.span,
    ))
}

fn parse_type_list(par: &mut Parser, end: TokenKind) -> ParseResult<Vec<Node<TypeDesc>>> {
    let mut types = vec![];
    if par.peek() == Some(end) {
        return Ok(types);
    }
    loop {
        types.push(parse_type_desc(par)?);
        if par.eat(TokenKind::Comma).is_none() {
            break;
        }
    }
    Ok(types)
}
