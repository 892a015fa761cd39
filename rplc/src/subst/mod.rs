//! # Substitution
//!
//! A [`Substitution`] maps region parameters to RPLs. Applying it replaces
//! a leading parameter and keeps the suffix: `P:Rx` with `P ↦ A:B` becomes
//! `A:B:Rx`. Parameters only ever occur at the head of an RPL, so a single
//! head rewrite is complete.
//!
//! Substitutions are built from three sources while resolving an access:
//! the accessed object's class arguments, the callee's function parameters
//! bound at a call site, and the inheritance path from the class declaring
//! the member to the class of the object ([`inheritance`]).

pub mod inheritance;

use std::fmt;

use crate::effects::{Effect, EffectSummary};
use crate::rpl::{ParamName, Rpl};

pub use inheritance::{InheritanceEdge, InheritanceGraph};

/// An ordered set of parameter bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: Vec<(ParamName, Rpl)>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `param` unless it is already bound. Returns whether it was added.
    pub fn bind(&mut self, param: ParamName, rpl: Rpl) -> bool {
        if self.get(&param).is_some() {
            return false;
        }
        self.bindings.push((param, rpl));
        true
    }

    /// Builder form of [`Substitution::bind`].
    pub fn with(mut self, param: ParamName, rpl: Rpl) -> Self {
        self.bind(param, rpl);
        self
    }

    /// Bind each parameter to the RPL at the same position.
    pub fn positional<'a>(params: impl IntoIterator<Item = &'a ParamName>, rpls: impl IntoIterator<Item = Rpl>) -> Self {
        let mut subst = Self::new();
        for (param, rpl) in params.into_iter().zip(rpls) {
            subst.bind(param.clone(), rpl);
        }
        subst
    }

    /// Bind every parameter in `params` that is still unbound to `fallback`.
    pub fn bind_missing<'a>(&mut self, params: impl IntoIterator<Item = &'a ParamName>, fallback: &Rpl) {
        for param in params {
            self.bind(param.clone(), fallback.clone());
        }
    }

    pub fn get(&self, param: &ParamName) -> Option<&Rpl> {
        self.bindings.iter().find(|(p, _)| p == param).map(|(_, rpl)| rpl)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ParamName, Rpl)> {
        self.bindings.iter()
    }

    /// Rewrite the head of `rpl` if it is a bound parameter.
    pub fn apply(&self, rpl: &Rpl) -> Rpl {
        match rpl.head_param().and_then(|param| self.get(param)) {
            Some(replacement) => rpl.replace_head(replacement),
            None => rpl.clone(),
        }
    }

    pub fn apply_all(&self, rpls: &[Rpl]) -> Vec<Rpl> {
        rpls.iter().map(|rpl| self.apply(rpl)).collect()
    }

    pub fn apply_effect(&self, effect: &Effect) -> Effect {
        effect.map_rpl(|rpl| self.apply(rpl))
    }

    pub fn apply_summary(&self, summary: &EffectSummary) -> EffectSummary {
        summary.map_rpls(|rpl| self.apply(rpl))
    }

    /// Rewrite the bound RPLs, keeping the parameters.
    pub fn map_rpls(&self, f: &impl Fn(&Rpl) -> Rpl) -> Substitution {
        Substitution {
            bindings: self.bindings.iter().map(|(p, rpl)| (p.clone(), f(rpl))).collect(),
        }
    }

    /// Bindings of both substitutions applied simultaneously. `self` wins
    /// where both bind the same parameter.
    pub fn union(&self, other: &Substitution) -> Substitution {
        let mut merged = self.clone();
        for (param, rpl) in &other.bindings {
            merged.bind(param.clone(), rpl.clone());
        }
        merged
    }

    /// The substitution equivalent to applying `self`, then `outer`.
    pub fn then(&self, outer: &Substitution) -> Substitution {
        let mut composed = Substitution::new();
        for (param, rpl) in &self.bindings {
            composed.bind(param.clone(), outer.apply(rpl));
        }
        for (param, rpl) in &outer.bindings {
            composed.bind(param.clone(), rpl.clone());
        }
        composed
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (param, rpl)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ↦ {}", param.name, rpl)?;
        }
        f.write_str("]")
    }
}
