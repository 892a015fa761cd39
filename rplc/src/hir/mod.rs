//! # Declaration Tree
//!
//! The host hands the checker one translation unit as a tree of
//! declarations. Every declaration carries a unique [`DeclId`], a span and
//! the raw annotation clauses the host parsed from its attribute syntax.
//! Nothing in this module is resolved: names are plain strings and RPLs are
//! still text. The binder turns clauses into typed records.
//!
//! The tree is serde-serializable so a host (or the `rplc` binary) can pass
//! it as JSON:
//!
//! ```json
//! { "attrs": [{ "attr": "region", "names": ["Left"] }],
//!   "decls": [{ "id": 1, "name": "a", "kind": "var",
//!               "ty": { "kind": "scalar" },
//!               "attrs": [{ "attr": "arg", "rpls": ["Left"] }] }] }
//! ```

pub mod annotations;
pub mod build;
pub mod expr;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

pub use annotations::{AttrKind, Attribute};
pub use expr::{Block, CastKind, Expr, ExprKind, LocalDecl, Stmt};

/// Identity of a declaration, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A translation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Clauses at translation-unit scope (global `region` declarations).
    #[serde(default)]
    pub attrs: Vec<Attribute>,
    /// Top-level declarations in source order.
    #[serde(default)]
    pub decls: Vec<Decl>,
}

/// A named declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    pub id: DeclId,
    /// Unqualified name. Namespaces may be spelled into it (`ns::f`).
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub attrs: Vec<Attribute>,
    #[serde(flatten)]
    pub kind: DeclKind,
}

/// What a declaration declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclKind {
    Class(ClassDecl),
    Function(FunctionDecl),
    Field(FieldDecl),
    /// A namespace-scope variable.
    Var(VarDecl),
}

/// A class, struct or union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(default)]
    pub bases: Vec<BaseSpec>,
    /// Fields, methods and nested classes.
    #[serde(default)]
    pub members: Vec<Decl>,
}

/// A direct base class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseSpec {
    /// Name of the base class as written.
    pub class: String,
    /// Virtual inheritance.
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub span: Span,
}

/// A function or method declaration, with or without a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default = "Type::scalar")]
    pub ret: Type,
    #[serde(default)]
    pub is_virtual: bool,
    /// Static member functions have no `this`.
    #[serde(default)]
    pub is_static: bool,
    /// Overload signature. Derived from the parameter types when absent.
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub body: Option<Block>,
}

impl FunctionDecl {
    /// The overload signature used to match redeclarations and overrides.
    pub fn signature(&self) -> String {
        match &self.signature {
            Some(signature) => signature.clone(),
            None => {
                let types: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
                format!("({})", types.join(", "))
            }
        }
    }
}

/// A formal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub id: DeclId,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub attrs: Vec<Attribute>,
    #[serde(default)]
    pub span: Span,
}

/// A data member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub ty: Type,
    #[serde(default)]
    pub is_static: bool,
}

/// A namespace-scope variable. Always has static storage duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub ty: Type,
}

/// The shape of a type, as far as region slots are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// Any non-class, non-pointer type.
    Scalar,
    Class { name: String },
    Pointer { pointee: Box<Type> },
    Reference { referent: Box<Type> },
    Array { element: Box<Type> },
}

impl Type {
    pub fn scalar() -> Self {
        Self::Scalar
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into() }
    }

    pub fn pointer(pointee: Type) -> Self {
        Self::Pointer {
            pointee: Box::new(pointee),
        }
    }

    pub fn reference(referent: Type) -> Self {
        Self::Reference {
            referent: Box::new(referent),
        }
    }

    pub fn array(element: Type) -> Self {
        Self::Array {
            element: Box::new(element),
        }
    }

    /// The type one indirection below, for pointers, references and arrays.
    pub fn inner(&self) -> Option<&Type> {
        match self {
            Self::Pointer { pointee } => Some(pointee),
            Self::Reference { referent } => Some(referent),
            Self::Array { element } => Some(element),
            Self::Scalar | Self::Class { .. } => None,
        }
    }

    /// The class name, if this is a class type.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => f.write_str("scalar"),
            Self::Class { name } => f.write_str(name),
            Self::Pointer { pointee } => write!(f, "{pointee}*"),
            Self::Reference { referent } => write!(f, "{referent}&"),
            Self::Array { element } => write!(f, "{element}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_signature() {
        let function = FunctionDecl {
            params: vec![ParamDecl {
                id: DeclId(2),
                name: "p".to_string(),
                ty: Type::pointer(Type::class("Node")),
                attrs: vec![],
                span: Span::dummy(),
            }],
            ret: Type::Scalar,
            is_virtual: false,
            is_static: false,
            signature: None,
            body: None,
        };
        assert_eq!(function.signature(), "(Node*)");
    }

    #[test]
    fn test_deserialize_decl() {
        let json = r#"{
            "id": 7, "name": "x", "kind": "field",
            "ty": { "kind": "pointer", "pointee": { "kind": "scalar" } },
            "attrs": [{ "attr": "arg", "rpls": ["P", "P:Rx"] }]
        }"#;
        let decl: Decl = serde_json::from_str(json).unwrap();
        assert_eq!(decl.id, DeclId(7));
        match decl.kind {
            DeclKind::Field(field) => {
                assert_eq!(field.ty, Type::pointer(Type::Scalar));
                assert!(!field.is_static);
            }
            other => panic!("expected field, got {other:?}"),
        }
        assert_eq!(
            decl.attrs[0].kind,
            AttrKind::Arg {
                rpls: vec!["P".to_string(), "P:Rx".to_string()]
            }
        );
    }
}
