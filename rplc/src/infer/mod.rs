//! # Inference
//!
//! Runs between effect collection and the checks when the default scheme
//! asks for it:
//!
//! - [`regions`] solves the inference variables placed in unannotated
//!   region slots (`region-inference`, `inference`);
//! - [`effects`] computes summaries for unannotated functions
//!   (`effect-inference`, `inference`), bottom-up over the [`callgraph`].
//!
//! Both are monotone fixed points over a finite lattice and terminate; an
//! iteration cap guards against bugs and marks the result best-effort.

pub mod callgraph;
pub mod effects;
pub mod regions;

pub use callgraph::CallGraph;
pub use effects::infer_effects;
pub use regions::{solve_regions, RegionSolution};
