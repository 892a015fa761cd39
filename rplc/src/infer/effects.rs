//! Effect summary inference.
//!
//! Functions without an explicit or default summary are solved bottom-up
//! over the strongly connected components of their call graph. Within a
//! component, summaries start empty and grow until no member changes;
//! only members calling a changed function are revisited.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use super::callgraph::CallGraph;
use crate::check::collect::{BodyFacts, Facts};
use crate::check::index::ProgramIndex;
use crate::check::summaries::Summaries;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::effects::{Effect, EffectSet, EffectSummary};
use crate::hir::DeclId;
use crate::rpl::Rpl;
use crate::span::Span;

/// Re-derivations of one component member before giving up.
const MAX_VISITS_PER_FUNCTION: usize = 64;

/// Infer a summary for every canonical function missing from `summaries`.
pub fn infer_effects(
    index: &ProgramIndex<'_>,
    facts: &Facts,
    summaries: &mut Summaries,
    diagnostics: &mut Diagnostics,
) {
    let pending: Vec<DeclId> = index
        .canonical_functions()
        .iter()
        .copied()
        .filter(|f| !summaries.contains_key(f))
        .collect();
    if pending.is_empty() {
        return;
    }

    let mut with_body = Vec::new();
    for function in pending {
        if facts.bodies.contains_key(&function) {
            with_body.push(function);
        } else {
            // Nothing to look at: assume the worst.
            trace!(function = %index.function_key(function), "no body; assuming writes(Global)");
            summaries.insert(function, EffectSummary::inferred(vec![Effect::write(Rpl::global())], true));
        }
    }

    let graph = CallGraph::build(&with_body, facts);
    let components = graph.sccs();
    for component in &components {
        solve_component(index, &graph, component, facts, summaries);
    }
    debug!(
        functions = with_body.len(),
        components = components.len(),
        "inferred effect summaries"
    );

    for &function in index.canonical_functions() {
        if !with_body.contains(&function) {
            continue;
        }
        let Some(summary) = summaries.get(&function) else {
            continue;
        };
        let span = index.get(function).map(|info| info.span).unwrap_or_default();
        diagnostics.push(
            Diagnostic::new(
                Category::InferredSummary,
                format!("inferred summary for `{}`: {summary}", index.function_key(function)),
                span,
            )
            .with_decl(function)
            .with_payload(Payload::Inferred {
                effects: summary.effects().to_vec(),
                best_effort: summary.is_best_effort(),
            }),
        );
    }
}

fn solve_component(
    index: &ProgramIndex<'_>,
    graph: &CallGraph,
    component: &[DeclId],
    facts: &Facts,
    summaries: &mut Summaries,
) {
    let members: FxHashSet<DeclId> = component.iter().copied().collect();
    let mut sets: FxHashMap<DeclId, EffectSet> = FxHashMap::default();
    let mut best_effort: FxHashMap<DeclId, bool> = FxHashMap::default();
    for &function in component {
        summaries.insert(function, EffectSummary::inferred(Vec::new(), false));
        sets.insert(function, EffectSet::new());
        best_effort.insert(function, false);
    }

    let mut worklist: VecDeque<DeclId> = component.iter().copied().collect();
    let mut dirty: FxHashSet<DeclId> = members.clone();
    let mut visits = 0;
    let budget = MAX_VISITS_PER_FUNCTION * component.len();

    while let Some(function) = worklist.pop_front() {
        dirty.remove(&function);
        visits += 1;
        if visits > budget {
            warn!(
                function = %index.function_key(function),
                "effect inference did not converge; marking the component best-effort"
            );
            for member in component {
                best_effort.insert(*member, true);
                if let Some(summary) = summaries.get_mut(member) {
                    *summary = EffectSummary::inferred(summary.effects().to_vec(), true);
                }
            }
            break;
        }

        let Some(body) = facts.bodies.get(&function) else {
            continue;
        };
        let (derived, opaque) = derive(body, summaries);
        let grew = sets.get_mut(&function).is_some_and(|set| set.extend(derived));
        let was_best_effort = best_effort.get(&function).copied().unwrap_or(false);
        let is_best_effort = was_best_effort || opaque;
        if !grew && is_best_effort == was_best_effort {
            continue;
        }

        best_effort.insert(function, is_best_effort);
        let effects: Vec<Effect> = sets.get(&function).map(|s| s.effects().cloned().collect()).unwrap_or_default();
        trace!(function = %index.function_key(function), effects = effects.len(), "summary grew");
        summaries.insert(function, EffectSummary::inferred(effects, is_best_effort));
        for &caller in graph.callers(function) {
            if members.contains(&caller) && dirty.insert(caller) {
                worklist.push_back(caller);
            }
        }
    }
}

/// Non-local effects of a body under the current summaries, and whether
/// anything about them is uncertain.
fn derive(body: &BodyFacts, summaries: &Summaries) -> (Vec<(Effect, Span)>, bool) {
    let mut opaque = body.opaque;
    let mut derived: Vec<(Effect, Span)> = body
        .effects
        .iter()
        .filter(|(effect, _)| !effect.is_local())
        .cloned()
        .collect();
    for call in &body.calls {
        let Some(summary) = summaries.get(&call.callee) else {
            continue;
        };
        opaque |= summary.is_best_effort();
        for effect in summary.effects() {
            let effect = call.subst.apply_effect(effect);
            if !effect.is_local() {
                derived.push((effect, call.span));
            }
        }
    }
    (derived, opaque)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::collect::collect;
    use crate::check::summaries::initial_summaries;
    use crate::check::testing::context_for;
    use crate::config::DefaultScheme;
    use crate::hir::build::*;
    use crate::hir::{Program, Type};

    fn infer(program: &Program) -> (Summaries, Diagnostics) {
        context_for(program, DefaultScheme::EffectInference, |cx, diagnostics| {
            let facts = collect(cx, diagnostics);
            let mut summaries = initial_summaries(cx);
            infer_effects(cx.index, &facts, &mut summaries, diagnostics);
            summaries
        })
    }

    #[test]
    fn test_callee_effects_flow_to_caller() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A"]);
        let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
        b.push(x);
        let leaf_body = block(vec![b.stmt(assign(name("x"), lit()))]);
        let leaf = b.function("leaf", vec![], vec![], Some(leaf_body));
        let top_body = block(vec![b.stmt(call("leaf", vec![]))]);
        let top = b.function("top", vec![], vec![], Some(top_body));
        let (leaf, top) = (b.push(leaf), b.push(top));
        let (summaries, diagnostics) = infer(&b.build());
        assert_eq!(summaries[&leaf].to_string(), "writes(A)");
        assert_eq!(summaries[&top].to_string(), "writes(A)");
        assert_eq!(diagnostics.count(Category::InferredSummary), 2);
    }

    #[test]
    fn test_mutual_recursion_converges() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A", "B"]);
        let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
        let y = b.var("y", Type::Scalar, vec![arg(&["B"])]);
        b.push(x);
        b.push(y);
        let even_body = block(vec![b.stmt(assign(name("x"), lit())), b.stmt(call("odd", vec![]))]);
        let odd_body = block(vec![b.stmt(binary(name("y"), lit())), b.stmt(call("even", vec![]))]);
        let even = b.function("even", vec![], vec![], Some(even_body));
        let odd = b.function("odd", vec![], vec![], Some(odd_body));
        let (even, odd) = (b.push(even), b.push(odd));
        let (summaries, _) = infer(&b.build());
        assert_eq!(summaries[&even].to_string(), "writes(A), reads(B)");
        assert_eq!(summaries[&odd].to_string(), "reads(B), writes(A)");
        assert!(!summaries[&even].is_best_effort());
    }

    #[test]
    fn test_bodyless_function_is_best_effort() {
        let mut b = ProgramBuilder::new();
        let external = b.function("external", vec![], vec![], None);
        let caller_body = block(vec![b.stmt(call("external", vec![]))]);
        let caller = b.function("caller", vec![], vec![], Some(caller_body));
        let (external, caller) = (b.push(external), b.push(caller));
        let (summaries, diagnostics) = infer(&b.build());
        assert!(summaries[&external].is_best_effort());
        assert!(summaries[&caller].is_best_effort());
        assert_eq!(summaries[&caller].to_string(), "writes(Global)");
        // Only functions with a body are reported.
        assert_eq!(diagnostics.count(Category::InferredSummary), 1);
    }

    #[test]
    fn test_inference_is_idempotent() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A"]);
        let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
        b.push(x);
        let body = block(vec![b.stmt(assign(name("x"), lit())), b.stmt(call("f", vec![]))]);
        let f = b.function("f", vec![], vec![], Some(body));
        b.push(f);
        let program = b.build();
        let (first, _) = infer(&program);
        let (second, _) = infer(&program);
        assert_eq!(first, second);
    }
}
