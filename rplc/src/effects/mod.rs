//! # Effects
//!
//! An effect is a read or a write of a region. A function's effect summary
//! is the set of effects its body (and everything it calls) may have.
//!
//! | Relation | Meaning |
//! |----------|---------|
//! | `e ≤ e'` | `kind(e) ≤ kind(e')` and `rpl(e) ⊑ rpl(e')` |
//! | `S covers e` | some `e' ∈ S` with `e ≤ e'`, or `e` is on `Local` |
//! | `e # e'` | at least one is a write and the RPLs overlap |
//!
//! Summaries are checked against minimized effect sets ([`EffectSet`]), so
//! an increment reports a single write rather than a read and a write.

pub mod effect;
pub mod summary;

pub use effect::{Effect, EffectKind};
pub use summary::{EffectSet, EffectSummary, SummaryOrigin};
