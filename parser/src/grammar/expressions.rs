use crate::ast::{BinOperator, BoolOperator, CompOperator, Expr, UnaryOperator};
use crate::node::Node;
use crate::token::TokenKind;
use crate::{ParseResult, Parser};

// Expressions are parsed in Pratt's top-down operator precedence style.
// See <https://matklad.github.io/2020/04/13/simple-but-powerful-pratt-parsing.html>.

/// Parse an expression, starting with the next token.
pub fn parse_expr(par: &mut Parser) -> ParseResult<Node<Expr>> {
    parse_expr_with_min_bp(par, 0)
}

/// Parse an expression, stopping if/when we reach an operator that binds
/// less tightly than the given binding power.
fn parse_expr_with_min_bp(par: &mut Parser, min_bp: u8) -> ParseResult<Node<Expr>> {
    let mut expr_head = parse_expr_head(par)?;

    while let Some(op) = par.peek() {
        if let Some(lbp) = postfix_binding_power(op) {
            if lbp < min_bp {
                break;
            }
            expr_head = match op {
                TokenKind::ParenOpen => {
                    par.next()?;
                    let args = parse_call_args(par)?;
                    let close = par.expect(TokenKind::ParenClose, "call argument list")?;
                    let span = expr_head.span + close.span;
                    Node::new(
                        Expr::Call {
                            func: Box::new(expr_head),
                            args,
                        },
                        span,
                    )
                }
                TokenKind::Dot => {
                    par.next()?;
                    let attr = par.expect(TokenKind::Name, "attribute expression")?;
                    let span = expr_head.span + attr.span;
                    Node::new(
                        Expr::Attribute {
                            value: Box::new(expr_head),
                            attr: Node::new(attr.text, attr.span),
                        },
                        span,
                    )
                }
                _ => unreachable!(), // patterns above must match those in `postfix_binding_power`
            };
            continue;
        }

        if let Some((lbp, rbp)) = infix_binding_power(op) {
            if lbp < min_bp {
                break;
            }
            let op_tok = par.next()?;
            let right = parse_expr_with_min_bp(par, rbp)?;
            let span = expr_head.span + right.span;

            expr_head = match op {
                TokenKind::AmpAmp | TokenKind::PipePipe => Node::new(
                    Expr::BoolOperation {
                        left: Box::new(expr_head),
                        op: Node::new(bool_op(op), op_tok.span),
                        right: Box::new(right),
                    },
                    span,
                ),
                TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq => Node::new(
                    Expr::CompOperation {
                        left: Box::new(expr_head),
                        op: Node::new(comp_op(op), op_tok.span),
                        right: Box::new(right),
                    },
                    span,
                ),
                _ => Node::new(
                    Expr::BinOperation {
                        left: Box::new(expr_head),
                        op: Node::new(bin_op(op), op_tok.span),
                        right: Box::new(right),
                    },
                    span,
                ),
            };
            continue;
        }

        break;
    }

    Ok(expr_head)
}

fn parse_expr_head(par: &mut Parser) -> ParseResult<Node<Expr>> {
    match par.peek() {
        Some(TokenKind::Name) => {
            let tok = par.next()?;
            Ok(Node::new(Expr::Name(tok.text), tok.span))
        }
        Some(TokenKind::Num) => {
            let tok = par.next()?;
            Ok(Node::new(Expr::Num(tok.text), tok.span))
        }
        Some(TokenKind::Str) => {
            let tok = par.next()?;
            Ok(Node::new(Expr::Str(tok.text), tok.span))
        }
        Some(TokenKind::True) | Some(TokenKind::False) => {
            let tok = par.next()?;
            Ok(Node::new(Expr::Bool(tok.kind == TokenKind::True), tok.span))
        }
        Some(TokenKind::New) => {
            let new_tok = par.next()?;
            let name_tok = par.expect(TokenKind::Name, "contract creation expression")?;
            par.expect(TokenKind::ParenOpen, "contract creation expression")?;
            let args = parse_call_args(par)?;
            let close = par.expect(TokenKind::ParenClose, "contract creation expression")?;
            Ok(Node::new(
                Expr::New {
                    contract: Node::new(name_tok.text, name_tok.span),
                    args,
                },
                new_tok.span + close.span,
            ))
        }
        Some(TokenKind::Not) | Some(TokenKind::Minus) => {
            let op_tok = par.next()?;
            let op = if op_tok.kind == TokenKind::Not {
                UnaryOperator::Not
            } else {
                UnaryOperator::USub
            };
            let operand = parse_expr_with_min_bp(par, 11)?;
            let span = op_tok.span + operand.span;
            Ok(Node::new(
                Expr::UnaryOperation {
                    op: Node::new(op, op_tok.span),
                    operand: Box::new(operand),
                },
                span,
            ))
        }
        Some(TokenKind::ParenOpen) => {
            par.next()?;
            let inner = parse_expr(par)?;
            par.expect(TokenKind::ParenClose, "parenthesized expression")?;
            Ok(inner)
        }
        Some(other) => {
            let tok = par.next()?;
            Err(par.error(
                tok.span,
                format!("failed to parse expression: unexpected {}", other.describe()),
            ))
        }
        None => {
            let err = par.expect(TokenKind::Name, "expression").unwrap_err();
            Err(err)
        }
    }
}

fn parse_call_args(par: &mut Parser) -> ParseResult<Vec<Node<Expr>>> {
    let mut args = vec![];
    if par.peek() == Some(TokenKind::ParenClose) {
        return Ok(args);
    }
    loop {
        args.push(parse_expr(par)?);
        if par.eat(TokenKind::Comma).is_none() {
            break;
        }
    }
    Ok(args)
}

fn postfix_binding_power(op: TokenKind) -> Option<u8> {
    match op {
        TokenKind::ParenOpen | TokenKind::Dot => Some(13),
        _ => None,
    }
}

fn infix_binding_power(op: TokenKind) -> Option<(u8, u8)> {
    use TokenKind::*;
    match op {
        PipePipe => Some((1, 2)),
        AmpAmp => Some((3, 4)),
        EqEq | NotEq | Lt | LtEq | Gt | GtEq => Some((5, 6)),
        Plus | Minus => Some((7, 8)),
        Star | Slash | Percent => Some((9, 10)),
        _ => None,
    }
}

fn bin_op(op: TokenKind) -> BinOperator {
    match op {
        TokenKind::Plus => BinOperator::Add,
        TokenKind::Minus => BinOperator::Sub,
        TokenKind::Star => BinOperator::Mult,
        TokenKind::Slash => BinOperator::Div,
        TokenKind::Percent => BinOperator::Mod,
        _ => unreachable!(),
    }
}

fn comp_op(op: TokenKind) -> CompOperator {
    match op {
        TokenKind::EqEq => CompOperator::Eq,
        TokenKind::NotEq => CompOperator::NotEq,
        TokenKind::Lt => CompOperator::Lt,
        TokenKind::LtEq => CompOperator::LtE,
        TokenKind::Gt => CompOperator::Gt,
        TokenKind::GtEq => CompOperator::GtE,
        _ => unreachable!(),
    }
}

fn bool_op(op: TokenKind) -> BoolOperator {
    match op {
        TokenKind::AmpAmp => BoolOperator::And,
        TokenKind::PipePipe => BoolOperator::Or,
        _ => unreachable!(),
    }
}
