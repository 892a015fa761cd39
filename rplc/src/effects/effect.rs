//! Effect kinds and effects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rpl::{self, Rpl};

/// The kind of a memory access.
///
/// Kinds are ordered: `Read < Write`, and a write covers a read of the same
/// region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// A load.
    Read,
    /// A store.
    Write,
}

impl EffectKind {
    /// Whether an effect of this kind is covered by one of kind `other`.
    pub fn is_subeffect_of(self, other: EffectKind) -> bool {
        self <= other
    }

    /// The annotation keyword for this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Read => "reads",
            Self::Write => "writes",
        }
    }
}

/// A potential access: a kind and the region it touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Effect {
    /// Read or write.
    pub kind: EffectKind,
    /// The region accessed.
    pub rpl: Rpl,
}

impl Effect {
    /// Create an effect.
    pub fn new(kind: EffectKind, rpl: Rpl) -> Self {
        Self { kind, rpl }
    }

    /// A read of `rpl`.
    pub fn read(rpl: Rpl) -> Self {
        Self::new(EffectKind::Read, rpl)
    }

    /// A write of `rpl`.
    pub fn write(rpl: Rpl) -> Self {
        Self::new(EffectKind::Write, rpl)
    }

    /// Whether this effect touches only `Local`, which never needs covering.
    pub fn is_local(&self) -> bool {
        self.rpl.is_local()
    }

    /// Whether `other` covers this effect.
    pub fn is_covered_by(&self, other: &Effect) -> bool {
        self.kind.is_subeffect_of(other.kind) && rpl::is_included_in(&self.rpl, &other.rpl)
    }

    /// Whether this effect and `other` may not run in parallel.
    ///
    /// Two reads never conflict; otherwise the regions must overlap.
    pub fn conflicts_with(&self, other: &Effect) -> bool {
        if self.kind == EffectKind::Read && other.kind == EffectKind::Read {
            return false;
        }
        rpl::overlaps(&self.rpl, &other.rpl)
    }

    /// This effect with its RPL rewritten.
    pub fn map_rpl(&self, f: impl FnOnce(&Rpl) -> Rpl) -> Self {
        Self::new(self.kind, f(&self.rpl))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.keyword(), self.rpl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpl::{RegionName, Scope};

    fn region(name: &str) -> Rpl {
        Rpl::region(RegionName::new(name, Scope::Global))
    }

    #[test]
    fn test_kind_order() {
        assert!(EffectKind::Read.is_subeffect_of(EffectKind::Write));
        assert!(EffectKind::Read.is_subeffect_of(EffectKind::Read));
        assert!(!EffectKind::Write.is_subeffect_of(EffectKind::Read));
    }

    #[test]
    fn test_write_covers_read() {
        let read = Effect::read(region("A"));
        let write = Effect::write(region("A"));
        assert!(read.is_covered_by(&write));
        assert!(!write.is_covered_by(&read));
    }

    #[test]
    fn test_conflicts() {
        let left_w = Effect::write(region("Left"));
        let left_r = Effect::read(region("Left"));
        let right_r = Effect::read(region("Right"));
        assert!(left_w.conflicts_with(&left_r));
        assert!(!left_w.conflicts_with(&right_r));
        assert!(!left_r.conflicts_with(&left_r));
    }

    #[test]
    fn test_display() {
        assert_eq!(Effect::write(region("Left")).to_string(), "writes(Left)");
        assert_eq!(Effect::read(Rpl::everything()).to_string(), "reads(Root:*)");
    }
}
