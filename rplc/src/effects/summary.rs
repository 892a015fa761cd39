//! Effect summaries and minimized effect sets.

use std::fmt;

use serde::Serialize;

use super::Effect;
use crate::rpl::Rpl;
use crate::span::Span;

/// Where a summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SummaryOrigin {
    /// Written by the programmer.
    Declared,
    /// Filled in by the default scheme.
    Defaulted,
    /// Taken from an overridden virtual method.
    Inherited,
    /// Computed by the inference engine.
    Inferred { best_effort: bool },
}

/// The effects a function may have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectSummary {
    effects: Vec<Effect>,
    pure: bool,
    origin: SummaryOrigin,
}

impl EffectSummary {
    /// An explicit `reads`/`writes` summary.
    pub fn declared(effects: Vec<Effect>) -> Self {
        Self::with_origin(effects, SummaryOrigin::Declared)
    }

    /// An explicit `no_effect` summary.
    pub fn pure() -> Self {
        Self {
            effects: Vec::new(),
            pure: true,
            origin: SummaryOrigin::Declared,
        }
    }

    pub fn defaulted(effects: Vec<Effect>) -> Self {
        Self::with_origin(effects, SummaryOrigin::Defaulted)
    }

    pub fn inferred(effects: Vec<Effect>, best_effort: bool) -> Self {
        Self::with_origin(effects, SummaryOrigin::Inferred { best_effort })
    }

    pub fn with_origin(effects: Vec<Effect>, origin: SummaryOrigin) -> Self {
        let mut set = EffectSet::new();
        for effect in effects {
            set.insert(effect, Span::dummy());
        }
        Self {
            effects: set.into_effects(),
            pure: false,
            origin,
        }
    }

    /// The same effects under another origin.
    pub fn reorigin(mut self, origin: SummaryOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Whether the summary was written as `no_effect`.
    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn origin(&self) -> SummaryOrigin {
        self.origin
    }

    pub fn is_declared(&self) -> bool {
        self.origin == SummaryOrigin::Declared
    }

    pub fn is_inferred(&self) -> bool {
        matches!(self.origin, SummaryOrigin::Inferred { .. })
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(self.origin, SummaryOrigin::Inferred { best_effort: true })
    }

    /// Whether `effect` is covered. `Local` effects are always covered.
    pub fn covers(&self, effect: &Effect) -> bool {
        effect.is_local() || self.effects.iter().any(|e| effect.is_covered_by(e))
    }

    /// The effects among `effects` this summary does not cover.
    pub fn uncovered<'a>(&self, effects: impl IntoIterator<Item = &'a Effect>) -> Vec<Effect> {
        effects.into_iter().filter(|e| !self.covers(e)).cloned().collect()
    }

    /// This summary with every RPL rewritten. Origin and purity are kept.
    pub fn map_rpls(&self, f: impl Fn(&Rpl) -> Rpl) -> Self {
        let mut mapped = Self::with_origin(self.effects.iter().map(|e| e.map_rpl(&f)).collect(), self.origin);
        mapped.pure = self.pure;
        mapped
    }
}

impl fmt::Display for EffectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pure {
            return f.write_str("no_effect");
        }
        if self.effects.is_empty() {
            return f.write_str("{}");
        }
        for (i, effect) in self.effects.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{effect}")?;
        }
        Ok(())
    }
}

/// A set of effects kept minimal: no member is covered by another.
///
/// Each member remembers the span of the first access that produced it, or
/// of the access that produced the effect which replaced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectSet {
    entries: Vec<(Effect, Span)>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an effect. Returns whether the set changed.
    ///
    /// An effect already covered by a member is dropped; members covered by
    /// the new effect are removed, keeping the earliest span.
    pub fn insert(&mut self, effect: Effect, span: Span) -> bool {
        if self.entries.iter().any(|(e, _)| effect.is_covered_by(e)) {
            return false;
        }
        let mut first_span = None;
        self.entries.retain(|(e, s)| {
            if e.is_covered_by(&effect) {
                first_span.get_or_insert(*s);
                false
            } else {
                true
            }
        });
        let span = match first_span {
            Some(earlier) if !earlier.is_dummy() && (span.is_dummy() || earlier.line < span.line) => earlier,
            _ => span,
        };
        self.entries.push((effect, span));
        true
    }

    /// Add every effect of `other`. Returns whether the set changed.
    pub fn extend(&mut self, other: impl IntoIterator<Item = (Effect, Span)>) -> bool {
        let mut changed = false;
        for (effect, span) in other {
            changed |= self.insert(effect, span);
        }
        changed
    }

    /// Whether some member covers `effect`.
    pub fn covers(&self, effect: &Effect) -> bool {
        self.entries.iter().any(|(e, _)| effect.is_covered_by(e))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Effect, Span)> {
        self.entries.iter()
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.entries.iter().map(|(e, _)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The members, without spans, in insertion order.
    pub fn into_effects(self) -> Vec<Effect> {
        self.entries.into_iter().map(|(e, _)| e).collect()
    }
}

impl FromIterator<(Effect, Span)> for EffectSet {
    fn from_iter<I: IntoIterator<Item = (Effect, Span)>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
