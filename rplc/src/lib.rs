//! rplc: a region-path-list effect checker.
//!
//! Given a declaration tree annotated with region declarations, region
//! arguments and effect summaries, rplc verifies that:
//!
//! - every function's body is covered by its effect summary,
//! - redeclarations and virtual overrides agree with their contracts,
//! - operands of fork-join calls do not interfere,
//! - values are stored only where their regions are expected.
//!
//! Missing annotations are filled in by a configurable default scheme, or
//! inferred.
//!
//! # Architecture
//!
//! ```text
//! hir::Program ─► index ─► bind ─► regions ─► summaries ─► collect
//!                                                              │
//!   CheckOutcome ◄─ coverage, consistency, ◄─ infer (regions, effects)
//!                   interference, assign
//! ```

pub mod check;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod effects;
pub mod hir;
pub mod infer;
pub mod rpl;
pub mod span;
pub mod subst;

pub use config::{CheckerConfig, ConfigError, DefaultScheme};
pub use diagnostics::{Category, Diagnostic, Payload, Severity};
pub use driver::{check_program, load_program, CheckOutcome, LoadError};
