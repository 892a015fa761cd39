//! Statements and expressions of function bodies.
//!
//! Only the constructs that matter for memory effects are distinguished;
//! everything else is folded into [`ExprKind::Unary`] and
//! [`ExprKind::Binary`].

use serde::{Deserialize, Serialize};

use super::{Attribute, DeclId, ParamDecl, Type};
use crate::span::Span;

/// A braced sequence of statements. Opens a lexical scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    Expr {
        expr: Expr,
    },
    Local(LocalDecl),
    Block(Block),
    If {
        cond: Expr,
        then: Block,
        #[serde(rename = "else", default)]
        otherwise: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
}

/// A block-scope variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
    /// `static` locals have static storage duration.
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub attrs: Vec<Attribute>,
    #[serde(default)]
    pub init: Option<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ExprKind {
    Literal,
    /// A variable, parameter, field (through implicit `this`) or function.
    Name {
        name: String,
    },
    This,
    /// `base.field`, or `base->field` when `arrow` is set.
    Member {
        base: Box<Expr>,
        field: String,
        #[serde(default)]
        arrow: bool,
    },
    Deref {
        operand: Box<Expr>,
    },
    AddressOf {
        operand: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `compound` is set.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        #[serde(default)]
        compound: bool,
    },
    /// `++`/`--` in either position.
    Increment {
        target: Box<Expr>,
    },
    Unary {
        operand: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        #[serde(default)]
        arrow: bool,
        #[serde(default)]
        args: Vec<Expr>,
    },
    New {
        ty: Type,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Delete {
        operand: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        to: Type,
        kind: CastKind,
    },
    /// A closure. Captures are implicit: any outer name it mentions.
    Lambda {
        #[serde(default)]
        params: Vec<ParamDecl>,
        body: Block,
    },
}

/// How a cast converts its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastKind {
    /// Derived-to-base pointer or reference conversion.
    Upcast,
    /// A bit-level reinterpretation with unknown provenance.
    Reinterpret,
    /// Arithmetic or other value conversion.
    Value,
}
