//! # Region Path Lists
//!
//! An RPL names a position in the region hierarchy. It is written as a
//! colon-separated path such as `Root:Left`, `P:Rx` or `Root:*`.
//!
//! ## Elements
//!
//! | Element | Written | Meaning |
//! |---------|---------|---------|
//! | Special | `Root`, `Global`, `Local` | Reserved, implicitly declared regions |
//! | Region | `Rx` | A region name declared in some scope |
//! | Param | `P` | A region parameter of a class or function (head only) |
//! | Star | `*` | Any sequence of elements, including none |
//! | Var | `?3` | An inference placeholder (never written by users) |
//!
//! An RPL whose head is a region name or `Global` is implicitly rooted under
//! `Root`. The inclusion and overlap relations live in [`lattice`]; region
//! and parameter declarations live in [`scope`].

pub mod lattice;
pub mod scope;

use std::fmt;

use serde::{Serialize, Serializer};

use crate::hir::DeclId;

pub use lattice::{is_included_in, lub, overlaps};
pub use scope::{DeclareError, RegionScopes};

/// The lexical scope a region name is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Translation-unit scope.
    Global,
    /// The scope of a class or function declaration.
    Decl(DeclId),
}

/// The reserved, implicitly declared regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecialRegion {
    /// Top of the hierarchy.
    Root,
    /// Catch-all region for static-storage objects.
    Global,
    /// Automatic storage; never escapes its function.
    Local,
}

impl SpecialRegion {
    /// Look up a reserved name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Root" => Some(Self::Root),
            "Global" => Some(Self::Global),
            "Local" => Some(Self::Local),
            _ => None,
        }
    }

    /// The spelling of this region.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Global => "Global",
            Self::Local => "Local",
        }
    }
}

/// A declared region name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionName {
    /// The identifier as written.
    pub name: String,
    /// The scope that declares it.
    pub scope: Scope,
}

impl RegionName {
    /// Create a region name.
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }
}

/// A declared region parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamName {
    /// The identifier as written.
    pub name: String,
    /// The class or function declaring the parameter.
    pub owner: DeclId,
}

impl ParamName {
    /// Create a parameter name.
    pub fn new(name: impl Into<String>, owner: DeclId) -> Self {
        Self {
            name: name.into(),
            owner,
        }
    }
}

/// A region inference variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionVarId(pub u32);

/// One element of an RPL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RplElement {
    /// `Root`, `Global` or `Local`.
    Special(SpecialRegion),
    /// A declared region name.
    Region(RegionName),
    /// A region parameter reference.
    Param(ParamName),
    /// The wildcard `*`.
    Star,
    /// An inference placeholder.
    Var(RegionVarId),
}

impl RplElement {
    /// Whether this element stands for an unknown region under `Root`.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Param(_) | Self::Var(_))
    }
}

impl fmt::Display for RplElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Special(special) => f.write_str(special.as_str()),
            Self::Region(region) => f.write_str(&region.name),
            Self::Param(param) => f.write_str(&param.name),
            Self::Star => f.write_str("*"),
            Self::Var(var) => write!(f, "?{}", var.0),
        }
    }
}

/// A region path list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rpl {
    elements: Vec<RplElement>,
}

impl Rpl {
    /// Create an RPL from its elements. An empty path denotes `Root`.
    pub fn new(elements: Vec<RplElement>) -> Self {
        if elements.is_empty() {
            return Self::root();
        }
        Self { elements }
    }

    /// `Root`.
    pub fn root() -> Self {
        Self::special(SpecialRegion::Root)
    }

    /// `Global`.
    pub fn global() -> Self {
        Self::special(SpecialRegion::Global)
    }

    /// `Local`.
    pub fn local() -> Self {
        Self::special(SpecialRegion::Local)
    }

    /// `Local:<name>`, the frame storage of one automatic variable.
    pub fn local_var(name: impl Into<String>, decl: DeclId) -> Self {
        Self {
            elements: vec![
                RplElement::Special(SpecialRegion::Local),
                RplElement::Region(RegionName::new(name, Scope::Decl(decl))),
            ],
        }
    }

    /// `Root:*`, the RPL that includes every non-local region.
    pub fn everything() -> Self {
        Self {
            elements: vec![RplElement::Special(SpecialRegion::Root), RplElement::Star],
        }
    }

    /// A single reserved region.
    pub fn special(region: SpecialRegion) -> Self {
        Self {
            elements: vec![RplElement::Special(region)],
        }
    }

    /// A single declared region.
    pub fn region(region: RegionName) -> Self {
        Self {
            elements: vec![RplElement::Region(region)],
        }
    }

    /// A single parameter reference.
    pub fn param(param: ParamName) -> Self {
        Self {
            elements: vec![RplElement::Param(param)],
        }
    }

    /// A single inference variable.
    pub fn var(var: RegionVarId) -> Self {
        Self {
            elements: vec![RplElement::Var(var)],
        }
    }

    /// The elements of this RPL.
    pub fn elements(&self) -> &[RplElement] {
        &self.elements
    }

    /// The first element.
    pub fn head(&self) -> &RplElement {
        &self.elements[0]
    }

    /// The elements after the head.
    pub fn tail(&self) -> &[RplElement] {
        &self.elements[1..]
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// RPLs are never empty; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether this is `Local` or a path under it.
    pub fn is_local(&self) -> bool {
        matches!(self.head(), RplElement::Special(SpecialRegion::Local))
    }

    /// The parameter heading this RPL, if any.
    pub fn head_param(&self) -> Option<&ParamName> {
        match self.head() {
            RplElement::Param(param) => Some(param),
            _ => None,
        }
    }

    /// The inference variable heading this RPL, if any.
    pub fn head_var(&self) -> Option<RegionVarId> {
        match self.head() {
            RplElement::Var(var) => Some(*var),
            _ => None,
        }
    }

    /// Whether any element is an inference variable.
    pub fn has_vars(&self) -> bool {
        self.elements.iter().any(|e| matches!(e, RplElement::Var(_)))
    }

    /// Whether the RPL contains no wildcard.
    pub fn is_fully_specified(&self) -> bool {
        !self.elements.contains(&RplElement::Star)
    }

    /// This RPL extended with more elements.
    pub fn append(&self, suffix: &[RplElement]) -> Self {
        let mut elements = self.elements.clone();
        elements.extend_from_slice(suffix);
        Self { elements }
    }

    /// Replace the head element with a whole RPL, keeping the suffix.
    ///
    /// This is the substitution rule: `P:Rx` with `P ↦ A:B` is `A:B:Rx`.
    pub fn replace_head(&self, replacement: &Rpl) -> Self {
        replacement.append(self.tail())
    }
}

impl fmt::Display for Rpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

impl Serialize for Rpl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Split RPL text into its element spellings.
///
/// Whitespace around elements is ignored; empty elements are kept so the
/// binder can report them.
pub fn split_rpl_text(text: &str) -> Vec<&str> {
    text.split(':').map(str::trim).collect()
}
