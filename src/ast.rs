//! Syntax tree shared by the parser and the evaluator.
//!
//! The parser builds these nodes once; they are never mutated afterwards.
//! Function and class bodies are reference counted so that runtime function
//! objects can hold on to them without cloning the tree.

use std::rc::Rc;

pub type Block = Rc<[Statement]>;

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Integer(i64),
    String(String),
    Boolean(bool),
    None,
    Identifier(String),
    List(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Slice {
        object: Box<Expression>,
        start: Option<Box<Expression>>,
        stop: Option<Box<Expression>>,
        step: Option<Box<Expression>>,
    },
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Call {
        name: String,
        args: Vec<Expression>,
    },
    MethodCall {
        object: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }
}

/// A `def` parameter with its optional `: typename` annotation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
        }
    }

    pub fn annotated(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation.into()),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Assign {
        name: String,
        value: Expression,
    },
    AttributeAssign {
        object: Expression,
        name: String,
        value: Expression,
    },
    IndexAssign {
        object: Expression,
        index: Expression,
        value: Expression,
    },
    Print(Vec<Expression>),
    If {
        condition: Expression,
        then_body: Block,
        else_body: Option<Block>,
    },
    While {
        condition: Expression,
        body: Block,
    },
    For {
        target: String,
        iterable: Expression,
        body: Block,
    },
    ClassDef {
        name: String,
        base: Option<String>,
        body: Block,
    },
    FunctionDef {
        name: String,
        params: Vec<Param>,
        body: Block,
    },
    Return(Option<Expression>),
    Break,
    Continue,
    Pass,
    Expr(Expression),
    Try {
        body: Block,
        handler: Block,
    },
    Raise(Expression),
    Nonlocal(Vec<String>),
    Import(String),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}
