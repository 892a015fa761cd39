//! Runs the checking pipeline over one translation unit.
//!
//! ```ignore
//! use rplc::{check_program, CheckerConfig};
//!
//! let program = rplc::driver::load_program(Path::new("unit.json"))?;
//! let outcome = check_program(&program, &CheckerConfig::default());
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::check::assign::check_assignments;
use crate::check::bind::bind;
use crate::check::collect::collect;
use crate::check::consistency::{check_overrides, check_redeclarations};
use crate::check::coverage::check_coverage;
use crate::check::index::ProgramIndex;
use crate::check::interference::check_interference;
use crate::check::regions::resolve_regions;
use crate::check::summaries::initial_summaries;
use crate::check::CheckContext;
use crate::config::CheckerConfig;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::effects::EffectSummary;
use crate::hir::Program;
use crate::infer::{infer_effects, solve_regions};
use crate::span::Span;

/// Errors reading a translation unit.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed declaration tree in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a JSON declaration tree.
pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Everything a run reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckOutcome {
    pub diagnostics: Vec<Diagnostic>,
    /// Final summary of every function, keyed by display name.
    pub summaries: IndexMap<String, EffectSummary>,
}

impl CheckOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn count(&self, category: Category) -> usize {
        self.diagnostics.iter().filter(|d| d.category == category).count()
    }
}

/// Check a translation unit.
pub fn check_program(program: &Program, config: &CheckerConfig) -> CheckOutcome {
    let mut diagnostics = Diagnostics::new();
    let scheme = match config.scheme() {
        Ok(scheme) => scheme,
        Err(err) => {
            diagnostics.push(
                Diagnostic::new(Category::InvalidConfiguration, err.to_string(), Span::dummy()).with_payload(
                    Payload::Element {
                        text: config.default_scheme.clone(),
                    },
                ),
            );
            return CheckOutcome {
                diagnostics: diagnostics.into_vec(),
                summaries: IndexMap::new(),
            };
        }
    };
    info!(%scheme, decls = program.decls.len(), "checking translation unit");

    let index = ProgramIndex::build(program);
    let mut bindings = bind(&index, &mut diagnostics);
    let (mut regions, graph) = resolve_regions(&index, &bindings, scheme, &mut diagnostics);

    let (mut facts, mut summaries) = {
        let cx = CheckContext {
            index: &index,
            bindings: &bindings,
            regions: &regions,
            graph: &graph,
            config,
            scheme,
        };
        let summaries = initial_summaries(&cx);
        (collect(&cx, &mut diagnostics), summaries)
    };

    if scheme.infers_regions() {
        let solution = solve_regions(&mut regions, &mut bindings.scopes, &mut facts);
        if solution.best_effort {
            debug!("region solution is best-effort");
        }
    }
    if scheme.infers_effects() {
        infer_effects(&index, &facts, &mut summaries, &mut diagnostics);
    }

    let cx = CheckContext {
        index: &index,
        bindings: &bindings,
        regions: &regions,
        graph: &graph,
        config,
        scheme,
    };
    check_coverage(&index, &facts, &summaries, &mut diagnostics);
    check_redeclarations(&cx, &summaries, &mut diagnostics);
    check_overrides(&cx, &summaries, &mut diagnostics);
    check_interference(&facts, &summaries, &mut diagnostics);
    if config.check_assignments {
        check_assignments(&facts.flows, &mut diagnostics);
    }

    info!(
        diagnostics = diagnostics.len(),
        errors = diagnostics.iter().filter(|d| d.is_error()).count(),
        "check finished"
    );
    CheckOutcome {
        diagnostics: diagnostics.into_vec(),
        summaries: summaries
            .into_iter()
            .map(|(function, summary)| (index.function_key(function), summary))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::build::*;
    use crate::hir::Type;

    #[test]
    fn test_unknown_scheme_is_reported_once() {
        let mut b = ProgramBuilder::new();
        let x = b.var("x", Type::Scalar, vec![arg(&["Nowhere"])]);
        b.push(x);
        let config = CheckerConfig {
            default_scheme: "optimistic".to_string(),
            ..CheckerConfig::default()
        };
        let outcome = check_program(&b.build(), &config);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.count(Category::InvalidConfiguration), 1);
        assert!(outcome.has_errors());
    }

    #[test]
    fn test_summaries_are_keyed_by_name() {
        let mut b = ProgramBuilder::new();
        let f = b.function("f", vec![], vec![no_effect()], Some(block(vec![])));
        b.push(f);
        let outcome = check_program(&b.build(), &CheckerConfig::default());
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.summaries["f"].to_string(), "no_effect");
    }

    #[test]
    fn test_load_program_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_program(&path), Err(LoadError::Parse { .. })));
        assert!(matches!(
            load_program(&dir.path().join("missing.json")),
            Err(LoadError::Io { .. })
        ));
    }
}
