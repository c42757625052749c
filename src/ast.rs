// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Syntax tree of a Rego module.
//!
//! The tree records the shape of a policy and where each node came from; it
//! carries no evaluation state. Nodes own their children.

use crate::lexer::Span;

/// Infix operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Union,
    Intersection,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "|" => Self::Union,
            "&" => Self::Intersection,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            _ => return None,
        })
    }

    /// Higher binds tighter. All levels associate to the left.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 1,
            Self::Union => 2,
            Self::Intersection => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::Mod => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    Array,
    Set,
    Object,
}

/// `[term | body]`, `{term | body}` or `{key: term | body}`.
#[derive(Debug)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    pub key: Option<Expr>,
    pub term: Expr,
    pub body: Query,
}

#[derive(Debug)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Number,
    /// Unescaped content of a double-quoted string.
    String(String),
    RawString,
    Var,
    Array(Vec<Expr>),
    Set(Vec<Expr>),
    Object(Vec<(Expr, Expr)>),
    Comprehension(Box<Comprehension>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Neg(Box<Expr>),
    /// `target.name`
    Field {
        target: Box<Expr>,
        name: Span,
    },
    /// `target[index]`
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs = rhs` or `lhs := rhs`.
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `value in collection` or `key, value in collection`.
    Membership {
        key: Option<Box<Expr>>,
        value: Box<Expr>,
        collection: Box<Expr>,
    },
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, ExprKind::Var)
    }

    pub fn var_name(&self) -> Option<&str> {
        self.is_var().then(|| self.span.text())
    }
}

#[derive(Debug)]
pub struct Query {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
    pub with: Vec<With>,
}

#[derive(Debug)]
pub enum StmtKind {
    /// `some x, y`
    SomeVars(Vec<Span>),
    /// `some k, v in collection`
    SomeIn {
        key: Option<Expr>,
        value: Expr,
        collection: Expr,
    },
    Expr(Expr),
    Not(Expr),
    Every {
        key: Option<Span>,
        value: Span,
        domain: Expr,
        body: Query,
    },
}

/// `with target as value`
#[derive(Debug)]
pub struct With {
    pub span: Span,
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug)]
pub enum HeadKind {
    /// `default p := v`, with the parameter names of a default function.
    Default(Vec<Span>),
    Complete,
    /// `p contains key`, `p[key]` or a key-less `p.q`.
    PartialSet(Option<Expr>),
    Function(Vec<Expr>),
}

#[derive(Debug)]
pub struct RuleBody {
    pub span: Span,
    /// Value of an `else` branch.
    pub value: Option<Expr>,
    pub query: Query,
}

#[derive(Debug)]
pub struct Rule {
    pub span: Span,
    pub path: Expr,
    pub head: HeadKind,
    pub value: Option<Expr>,
    pub bodies: Vec<RuleBody>,
}

#[derive(Debug)]
pub struct Import {
    pub span: Span,
    pub path: Expr,
    pub alias: Option<Span>,
}

#[derive(Debug)]
pub struct Module {
    pub package: Expr,
    pub imports: Vec<Import>,
    pub rules: Vec<Rule>,
    pub rego_v1: bool,
}
