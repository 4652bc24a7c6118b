//! The Yul-shaped intermediate representation contracts are lowered into.
//!
//! The IR is deliberately small: blocks, single-assignment variable
//! declarations, ifs, loops and calls. `Display` renders the conventional
//! textual form, which is what `stream_ir` and the tests look at.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A numeric literal, rendered as written (`0x80`, `42`).
    Literal(String),
    /// A quoted string argument to pseudo-calls such as `datasize("C")`.
    StringLiteral(String),
    Identifier(String),
    Call {
        target: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn call(target: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call {
            target: target.into(),
            args,
        }
    }

    pub fn id(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn lit(value: impl Into<String>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn dec(value: usize) -> Self {
        Expression::Literal(format!("0x{:x}", value))
    }
}

pub type Block = Vec<Statement>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    VariableDeclaration {
        names: Vec<String>,
        value: Option<Expression>,
    },
    Assignment {
        name: String,
        value: Expression,
    },
    Expression(Expression),
    If {
        condition: Expression,
        body: Block,
    },
    ForLoop {
        pre: Block,
        condition: Expression,
        post: Block,
        body: Block,
    },
    Break,
    Continue,
    Leave,
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub body: Block,
}

/// A lowered code object: the executable block plus the function
/// definitions it can reach. Deployment and runtime code are separate
/// `Code` values; sub-objects are attached at the assembly level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Code {
    pub name: String,
    pub block: Block,
    pub functions: Vec<FunctionDefinition>,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::StringLiteral(value) => write!(f, "\"{}\"", value),
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Call { target, args } => {
                write!(f, "{}(", target)?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block, indent: usize) -> fmt::Result {
    writeln!(f, "{{")?;
    for stmt in block {
        write_stmt(f, stmt, indent + 1)?;
    }
    write!(f, "{:indent$}}}", "", indent = indent * 4)
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Statement, indent: usize) -> fmt::Result {
    let pad = indent * 4;
    match stmt {
        Statement::VariableDeclaration { names, value } => {
            write!(f, "{:pad$}let {}", "", names.join(", "), pad = pad)?;
            if let Some(value) = value {
                write!(f, " := {}", value)?;
            }
            writeln!(f)
        }
        Statement::Assignment { name, value } => {
            writeln!(f, "{:pad$}{} := {}", "", name, value, pad = pad)
        }
        Statement::Expression(expr) => writeln!(f, "{:pad$}{}", "", expr, pad = pad),
        Statement::If { condition, body } => {
            write!(f, "{:pad$}if {} ", "", condition, pad = pad)?;
            write_block(f, body, indent)?;
            writeln!(f)
        }
        Statement::ForLoop {
            pre,
            condition,
            post,
            body,
        } => {
            write!(f, "{:pad$}for ", "", pad = pad)?;
            write_block(f, pre, indent)?;
            write!(f, " {} ", condition)?;
            write_block(f, post, indent)?;
            write!(f, " ")?;
            write_block(f, body, indent)?;
            writeln!(f)
        }
        Statement::Break => writeln!(f, "{:pad$}break", "", pad = pad),
        Statement::Continue => writeln!(f, "{:pad$}continue", "", pad = pad),
        Statement::Leave => writeln!(f, "{:pad$}leave", "", pad = pad),
        Statement::Block(block) => {
            write!(f, "{:pad$}", "", pad = pad)?;
            write_block(f, block, indent)?;
            writeln!(f)
        }
    }
}

impl fmt::Display for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}({})", self.name, self.params.join(", "))?;
        if !self.returns.is_empty() {
            write!(f, " -> {}", self.returns.join(", "))?;
        }
        write!(f, " ")?;
        write_block(f, &self.body, 0)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "object \"{}\" {{", self.name)?;
        write!(f, "    code ")?;
        write_block(f, &self.block, 1)?;
        writeln!(f)?;
        for function in &self.functions {
            let text = function.to_string();
            for line in text.lines() {
                writeln!(f, "    {}", line)?;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Expression, Statement};

    #[test]
    fn call_rendering() {
        let expr = Expression::call(
            "mstore",
            vec![Expression::dec(0x40), Expression::id("$ptr")],
        );
        assert_eq!(expr.to_string(), "mstore(0x40, $ptr)");
    }

    #[test]
    fn statement_rendering() {
        let stmt = Statement::VariableDeclaration {
            names: vec!["$a".to_string()],
            value: Some(Expression::lit("0x1")),
        };
        let mut out = String::new();
        use std::fmt::Write;
        struct Wrapper<'a>(&'a Statement);
        impl std::fmt::Display for Wrapper<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                super::write_stmt(f, self.0, 0)
            }
        }
        write!(out, "{}", Wrapper(&stmt)).unwrap();
        assert_eq!(out, "let $a := 0x1\n");
    }
}
