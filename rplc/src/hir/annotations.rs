//! Raw annotation clauses.
//!
//! Each clause is what the host parsed out of one attribute; RPLs are kept
//! as text (`"P:Rx:*"`) and resolved by the binder.

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// One annotation clause attached to a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub kind: AttrKind,
    #[serde(default)]
    pub span: Span,
}

impl Attribute {
    pub fn new(kind: AttrKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The clause kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attr", rename_all = "snake_case")]
pub enum AttrKind {
    /// Declares region names in the scope of the declaration.
    Region { names: Vec<String> },
    /// Declares the region parameters of a class or function.
    Param { names: Vec<String> },
    /// Binds the region slots of a field, variable or parameter.
    Arg { rpls: Vec<String> },
    Reads { rpls: Vec<String> },
    Writes { rpls: Vec<String> },
    /// Claims the function has no effects at all.
    #[serde(alias = "pure")]
    NoEffect,
    /// Binds the region parameters of a direct base class.
    BaseArg { base: String, rpls: Vec<String> },
}

impl AttrKind {
    /// The clause keyword, for diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Region { .. } => "region",
            Self::Param { .. } => "param",
            Self::Arg { .. } => "arg",
            Self::Reads { .. } => "reads",
            Self::Writes { .. } => "writes",
            Self::NoEffect => "no_effect",
            Self::BaseArg { .. } => "base_arg",
        }
    }
}
