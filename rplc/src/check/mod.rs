//! The checking pipeline.
//!
//! Phases, in order:
//!
//! | Phase | Module | Produces |
//! |-------|--------|----------|
//! | index | [`index`] | declaration table, canonical functions |
//! | bind | [`bind`] | typed annotations, region scopes |
//! | regions | [`regions`] | region slots, inheritance DAG |
//! | summaries | [`summaries`] | declared, inherited and default contracts |
//! | collect | [`collect`] | effects, call sites, flows, fork-join sites |
//! | coverage | [`coverage`] | `effect-not-covered` |
//! | consistency | [`consistency`] | redeclaration and override violations |
//! | interference | [`interference`] | conflicts between fork-join operands |
//! | assign | [`assign`] | `invalid-assignment` |
//!
//! Inference ([`crate::infer`]) runs between collection and coverage.

pub mod assign;
pub mod bind;
pub mod collect;
pub mod consistency;
pub mod coverage;
pub mod index;
pub mod interference;
pub mod regions;
pub mod summaries;

use crate::config::{CheckerConfig, DefaultScheme};
use crate::subst::InheritanceGraph;

use bind::Bindings;
use index::ProgramIndex;
use regions::RegionTable;

/// Read-only state shared by the phases after region resolution.
pub struct CheckContext<'c, 'a> {
    pub index: &'c ProgramIndex<'a>,
    pub bindings: &'c Bindings,
    pub regions: &'c RegionTable,
    pub graph: &'c InheritanceGraph,
    pub config: &'c CheckerConfig,
    pub scheme: DefaultScheme,
}
