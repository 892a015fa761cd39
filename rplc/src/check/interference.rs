//! Non-interference of fork-join operands.
//!
//! Two operands may run in parallel only if no write of one overlaps any
//! effect of the other. A `parallel-for` body runs concurrently with
//! itself, so it is checked against its own effects.

use tracing::debug;

use super::collect::{Facts, ForkJoinOperand, ForkJoinSite};
use super::summaries::Summaries;
use crate::config::ForkJoinShape;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::effects::Effect;

/// Report one `interference` per conflicting operand pair.
pub fn check_interference(facts: &Facts, summaries: &Summaries, diagnostics: &mut Diagnostics) {
    let mut conflicts = 0;
    for site in &facts.fork_joins {
        let effects: Vec<Vec<Effect>> = site
            .operands
            .iter()
            .map(|operand| operand_effects(operand, summaries))
            .collect();
        for (left, right) in operand_pairs(site) {
            let Some((l, r)) = first_conflict(&effects[left], &effects[right]) else {
                continue;
            };
            conflicts += 1;
            let message = if left == right {
                format!(
                    "iterations of the `{}` body interfere: `{l}` conflicts with `{r}`",
                    site.callee
                )
            } else {
                format!(
                    "operands {} and {} of `{}` interfere: `{l}` conflicts with `{r}`",
                    left + 1,
                    right + 1,
                    site.callee
                )
            };
            diagnostics.push(
                Diagnostic::new(Category::Interference, message, site.span)
                    .with_decl(site.function)
                    .with_payload(Payload::Conflict {
                        left: l.clone(),
                        right: r.clone(),
                    }),
            );
        }
    }
    debug!(sites = facts.fork_joins.len(), conflicts, "checked fork-join interference");
}

fn operand_effects(operand: &ForkJoinOperand, summaries: &Summaries) -> Vec<Effect> {
    match operand {
        ForkJoinOperand::Closure { facts, .. } => facts.resolve(summaries).into_effects(),
        ForkJoinOperand::Function { callee, subst, .. } => summaries
            .get(callee)
            .map(|summary| summary.effects().iter().map(|e| subst.apply_effect(e)).collect())
            .unwrap_or_default(),
    }
}

fn operand_pairs(site: &ForkJoinSite) -> Vec<(usize, usize)> {
    let n = site.operands.len();
    match site.shape {
        ForkJoinShape::Invoke => (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect(),
        ForkJoinShape::ParallelFor => (0..n).map(|i| (i, i)).collect(),
    }
}

fn first_conflict<'e>(left: &'e [Effect], right: &'e [Effect]) -> Option<(&'e Effect, &'e Effect)> {
    left.iter()
        .flat_map(|l| right.iter().map(move |r| (l, r)))
        .find(|(l, r)| l.conflicts_with(r))
}
