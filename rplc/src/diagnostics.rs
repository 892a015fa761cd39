//! Structured diagnostics.
//!
//! The checker never renders source text. Each diagnostic carries a
//! category tag, the span and declaration it concerns, a one-line message
//! and a payload with the structured facts (the uncovered effect, the
//! conflicting pair, the inferred summary). The host renders them; the
//! `rplc` binary prints them as text or JSON.

use std::fmt;

use serde::Serialize;

use crate::effects::Effect;
use crate::hir::DeclId;
use crate::rpl::Rpl;
use crate::span::Span;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Note => f.write_str("note"),
        }
    }
}

/// What kind of problem a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    EffectNotCovered,
    MissingRegionArgument,
    SuperfluousRegionArgument,
    RplElementUndeclared,
    MisplacedRegionParameter,
    DuplicateAttribute,
    MisplacedAttribute,
    InvalidCallArgument,
    NotImplemented,
    OverrideEffectViolation,
    RedeclarationEffectViolation,
    Interference,
    InvalidAssignment,
    InferredSummary,
    InvalidConfiguration,
}

impl Category {
    /// The tag as it appears in output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EffectNotCovered => "effect-not-covered",
            Self::MissingRegionArgument => "missing-region-argument",
            Self::SuperfluousRegionArgument => "superfluous-region-argument",
            Self::RplElementUndeclared => "rpl-element-undeclared",
            Self::MisplacedRegionParameter => "misplaced-region-parameter",
            Self::DuplicateAttribute => "duplicate-attribute",
            Self::MisplacedAttribute => "misplaced-attribute",
            Self::InvalidCallArgument => "invalid-call-argument",
            Self::NotImplemented => "not-implemented",
            Self::OverrideEffectViolation => "override-effect-violation",
            Self::RedeclarationEffectViolation => "redeclaration-effect-violation",
            Self::Interference => "interference",
            Self::InvalidAssignment => "invalid-assignment",
            Self::InferredSummary => "inferred-summary",
            Self::InvalidConfiguration => "invalid-configuration",
        }
    }

    /// The severity diagnostics of this category are reported with.
    pub fn severity(self) -> Severity {
        match self {
            Self::EffectNotCovered
            | Self::RplElementUndeclared
            | Self::MisplacedRegionParameter
            | Self::InvalidCallArgument
            | Self::OverrideEffectViolation
            | Self::RedeclarationEffectViolation
            | Self::Interference
            | Self::InvalidConfiguration => Severity::Error,
            Self::MissingRegionArgument
            | Self::SuperfluousRegionArgument
            | Self::DuplicateAttribute
            | Self::MisplacedAttribute
            | Self::NotImplemented
            | Self::InvalidAssignment => Severity::Warning,
            Self::InferredSummary => Severity::Note,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured facts attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Payload {
    None,
    Effect { effect: Effect },
    Effects { effects: Vec<Effect> },
    Rpl { rpl: Rpl },
    /// The offending spelling of an RPL element or clause.
    Element { text: String },
    /// One effect from each side of a fork-join pair.
    Conflict { left: Effect, right: Effect },
    Inferred { effects: Vec<Effect>, best_effort: bool },
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl: Option<DeclId>,
    pub payload: Payload,
}

impl Diagnostic {
    /// Create a diagnostic with the category's severity and no payload.
    pub fn new(category: Category, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: category.severity(),
            category,
            message: message.into(),
            span,
            decl: None,
            payload: Payload::None,
        }
    }

    pub fn with_decl(mut self, decl: DeclId) -> Self {
        self.decl = Some(decl);
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}: {}", self.severity, self.category, self.span, self.message)
    }
}

/// Diagnostics collected by a run, in emission order.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(%diagnostic, "diagnostic");
        self.items.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn count(&self, category: Category) -> usize {
        self.items.iter().filter(|d| d.category == category).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::new(
            Category::EffectNotCovered,
            "effect writes(P) is not covered by the summary of `m`",
            Span::at(7, 3),
        );
        assert_eq!(
            diagnostic.to_string(),
            "error[effect-not-covered] 7:3: effect writes(P) is not covered by the summary of `m`"
        );
    }

    #[test]
    fn test_severity_by_category() {
        assert_eq!(Category::InferredSummary.severity(), Severity::Note);
        assert_eq!(Category::DuplicateAttribute.severity(), Severity::Warning);
        assert_eq!(Category::Interference.severity(), Severity::Error);
    }

    #[test]
    fn test_json_shape() {
        let diagnostic = Diagnostic::new(Category::RplElementUndeclared, "undeclared", Span::at(1, 1))
            .with_decl(DeclId(4))
            .with_payload(Payload::Element { text: "Rx".to_string() });
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["category"], "rpl-element-undeclared");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["decl"], 4);
        assert_eq!(json["payload"]["kind"], "element");
        assert_eq!(json["payload"]["text"], "Rx");
    }

    #[test]
    fn test_collection() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::new(Category::InferredSummary, "inferred", Span::dummy()));
        assert!(!diagnostics.has_errors());
        diagnostics.push(Diagnostic::new(Category::Interference, "race", Span::dummy()));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.count(Category::Interference), 1);
    }
}
