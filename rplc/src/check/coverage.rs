//! Summary coverage: every effect of a body must be covered by the
//! function's contract.

use tracing::debug;

use super::collect::Facts;
use super::index::ProgramIndex;
use super::summaries::Summaries;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};

/// Report each distinct uncovered effect once, at its first access.
///
/// Inferred summaries cover their bodies by construction and are skipped.
pub fn check_coverage(
    index: &ProgramIndex<'_>,
    facts: &Facts,
    summaries: &Summaries,
    diagnostics: &mut Diagnostics,
) {
    let mut violations = 0;
    for (&function, body) in &facts.bodies {
        let Some(summary) = summaries.get(&function) else {
            continue;
        };
        if summary.is_inferred() {
            continue;
        }
        let effects = body.resolve(summaries);
        for (effect, span) in effects.iter() {
            if summary.covers(effect) {
                continue;
            }
            violations += 1;
            diagnostics.push(
                Diagnostic::new(
                    Category::EffectNotCovered,
                    format!(
                        "effect `{effect}` of `{}` is not covered by its summary `{summary}`",
                        index.function_key(function)
                    ),
                    *span,
                )
                .with_decl(function)
                .with_payload(Payload::Effect { effect: effect.clone() }),
            );
        }
    }
    debug!(violations, "checked summary coverage");
}
