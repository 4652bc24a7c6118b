use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Module {
    pub body: Vec<ModuleStmt>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum ModuleStmt {
    Import(Node<Import>),
    Contract(Node<Contract>),
}

/// `import "<name>";` where the name refers to a registered source unit.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Import {
    pub name: Node<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Contract {
    pub name: Node<String>,
    pub bases: Vec<Node<String>>,
    pub body: Vec<ContractStmt>,
    pub doc: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum ContractStmt {
    Variable(Node<VariableDeclaration>),
    Function(Node<Function>),
}

/// A variable declaration, used for state variables, immutables, function
/// parameters and local declarations alike.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct VariableDeclaration {
    pub typ: Node<TypeDesc>,
    pub name: Node<String>,
    pub immutable: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// A function definition. Constructors are functions without a name.
///
/// The node id of a function is its globally-unique, ascending numeric id;
/// code generation orders its work queue by it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Function {
    pub name: Option<Node<String>>,
    pub params: Vec<Node<VariableDeclaration>>,
    pub returns: Vec<Node<TypeDesc>>,
    pub visibility: Visibility,
    pub body: Option<Vec<Node<FuncStmt>>>,
    pub doc: Option<String>,
}

impl Function {
    pub fn is_constructor(&self) -> bool {
        self.name.is_none()
    }

    pub fn name_str(&self) -> &str {
        self.name.as_ref().map(|name| name.kind.as_str()).unwrap_or("constructor")
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum TypeDesc {
    Base {
        base: String,
    },
    Function {
        params: Vec<Node<TypeDesc>>,
        returns: Vec<Node<TypeDesc>>,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum FuncStmt {
    VarDecl {
        decl: Node<VariableDeclaration>,
        value: Option<Node<Expr>>,
    },
    Assign {
        target: Node<Expr>,
        value: Node<Expr>,
    },
    If {
        test: Node<Expr>,
        body: Vec<Node<FuncStmt>>,
        or_else: Vec<Node<FuncStmt>>,
    },
    While {
        test: Node<Expr>,
        body: Vec<Node<FuncStmt>>,
    },
    Return {
        value: Option<Node<Expr>>,
    },
    Break,
    Continue,
    Expr {
        value: Node<Expr>,
    },
    /// Raw assembly passed through to the IR unchanged.
    Assembly {
        body: String,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum Expr {
    Name(String),
    Num(String),
    Bool(bool),
    Str(String),
    BinOperation {
        left: Box<Node<Expr>>,
        op: Node<BinOperator>,
        right: Box<Node<Expr>>,
    },
    CompOperation {
        left: Box<Node<Expr>>,
        op: Node<CompOperator>,
        right: Box<Node<Expr>>,
    },
    BoolOperation {
        left: Box<Node<Expr>>,
        op: Node<BoolOperator>,
        right: Box<Node<Expr>>,
    },
    UnaryOperation {
        op: Node<UnaryOperator>,
        operand: Box<Node<Expr>>,
    },
    Attribute {
        value: Box<Node<Expr>>,
        attr: Node<String>,
    },
    Call {
        func: Box<Node<Expr>>,
        args: Vec<Node<Expr>>,
    },
    New {
        contract: Node<String>,
        args: Vec<Node<Expr>>,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BinOperator {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum CompOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum UnaryOperator {
    Not,
    USub,
}

impl Contract {
    /// True iff every declared function (constructor included) has a body.
    pub fn is_fully_implemented(&self) -> bool {
        self.body.iter().all(|stmt| match stmt {
            ContractStmt::Function(func) => func.kind.body.is_some(),
            ContractStmt::Variable(_) => true,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &Node<Function>> {
        self.body.iter().filter_map(|stmt| match stmt {
            ContractStmt::Function(func) => Some(func),
            _ => None,
        })
    }

    pub fn variables(&self) -> impl Iterator<Item = &Node<VariableDeclaration>> {
        self.body.iter().filter_map(|stmt| match stmt {
            ContractStmt::Variable(var) => Some(var),
            _ => None,
        })
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Base { base } => write!(f, "{}", base),
            TypeDesc::Function { params, returns } => {
                write!(f, "function(")?;
                for (idx, param) in params.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", param.kind)?;
                }
                write!(f, ")")?;
                if !returns.is_empty() {
                    write!(f, " returns (")?;
                    for (idx, ret) in returns.iter().enumerate() {
                        if idx > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", ret.kind)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}
