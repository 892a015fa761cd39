//! Contracts must agree across redeclarations and virtual overrides.

use tracing::debug;

use super::bind::DeclaredEffects;
use super::summaries::{overridden_methods, Summaries};
use super::CheckContext;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::effects::{Effect, SummaryOrigin};
use crate::rpl::Rpl;
use crate::subst::Substitution;

/// Every later declaration with an explicit summary must be covered by the
/// canonical declaration's contract.
pub fn check_redeclarations(cx: &CheckContext<'_, '_>, summaries: &Summaries, diagnostics: &mut Diagnostics) {
    for &canonical in cx.index.canonical_functions() {
        let Some(contract) = summaries.get(&canonical) else {
            continue;
        };
        for &redeclaration in cx.index.redeclarations(canonical) {
            let Some(declared) = cx.bindings.table.effects(redeclaration) else {
                continue;
            };
            let effects: Vec<Effect> = match declared {
                DeclaredEffects::Pure => continue,
                DeclaredEffects::Effects(effects) => effects.clone(),
            };
            let rename = Substitution::positional(
                cx.bindings.function_params(redeclaration),
                cx.bindings
                    .function_params(canonical)
                    .iter()
                    .map(|p| Rpl::param(p.clone())),
            );
            let renamed: Vec<Effect> = effects.iter().map(|e| rename.apply_effect(e)).collect();
            let uncovered = contract.uncovered(&renamed);
            if uncovered.is_empty() {
                continue;
            }
            let span = cx.index.get(redeclaration).map(|i| i.span).unwrap_or_default();
            diagnostics.push(
                Diagnostic::new(
                    Category::RedeclarationEffectViolation,
                    format!(
                        "redeclaration of `{}` has effects not covered by the first declaration's summary `{contract}`",
                        cx.index.function_key(canonical)
                    ),
                    span,
                )
                .with_decl(redeclaration)
                .with_payload(Payload::Effects { effects: uncovered }),
            );
        }
    }
}

/// An override's summary must be covered by each overridden summary,
/// rewritten into the derived class's vocabulary.
pub fn check_overrides(cx: &CheckContext<'_, '_>, summaries: &Summaries, diagnostics: &mut Diagnostics) {
    let mut checked = 0;
    for &function in cx.index.canonical_functions() {
        let Some(summary) = summaries.get(&function) else {
            continue;
        };
        if summary.origin() == SummaryOrigin::Inherited {
            continue;
        }
        for overridden in overridden_methods(cx, function) {
            let Some(base) = summaries.get(&overridden.method) else {
                continue;
            };
            // Only programmer-written contracts bind overrides under inference.
            if cx.scheme.infers_effects() && !base.is_declared() {
                continue;
            }
            checked += 1;
            let contract = overridden.subst.apply_summary(base);
            let uncovered = contract.uncovered(summary.effects());
            if uncovered.is_empty() {
                continue;
            }
            let span = cx.index.get(function).map(|i| i.span).unwrap_or_default();
            diagnostics.push(
                Diagnostic::new(
                    Category::OverrideEffectViolation,
                    format!(
                        "`{}` overrides `{}` but its summary `{summary}` is not covered by `{contract}`",
                        cx.index.function_key(function),
                        cx.index.function_key(overridden.method)
                    ),
                    span,
                )
                .with_decl(function)
                .with_payload(Payload::Effects { effects: uncovered }),
            );
        }
    }
    debug!(checked, "checked overrides");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::summaries::initial_summaries;
    use crate::check::testing::context_for;
    use crate::config::DefaultScheme;
    use crate::hir::build::*;
    use crate::hir::{Program, Type};

    fn consistency(program: &Program, scheme: DefaultScheme) -> Diagnostics {
        let (_, diagnostics) = context_for(program, scheme, |cx, diagnostics| {
            let summaries = initial_summaries(cx);
            check_redeclarations(cx, &summaries, diagnostics);
            check_overrides(cx, &summaries, diagnostics);
        });
        diagnostics
    }

    #[test]
    fn test_redeclaration_must_be_covered() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A", "B"]);
        let first = b.function("f", vec![], vec![reads(&["A"])], None);
        let same = b.function("f", vec![], vec![reads(&["A"])], None);
        let wider = b.function("f", vec![], vec![writes(&["A", "B"])], Some(block(vec![])));
        b.push(first);
        b.push(same);
        let wider_id = b.push(wider);
        let diagnostics = consistency(&b.build(), DefaultScheme::Global);
        assert_eq!(diagnostics.count(Category::RedeclarationEffectViolation), 1);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.decl, Some(wider_id));
        let Payload::Effects { effects } = &diagnostic.payload else {
            panic!("expected an effects payload");
        };
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_redeclaration_with_own_params_is_renamed() {
        let mut b = ProgramBuilder::new();
        let p1 = b.param("p", Type::pointer(Type::Scalar), vec![arg(&["P"])]);
        let p2 = b.param("p", Type::pointer(Type::Scalar), vec![arg(&["Q"])]);
        let first = b.function("f", vec![p1], vec![params(&["P"]), writes(&["P"])], None);
        let second = b.function("f", vec![p2], vec![params(&["Q"]), writes(&["Q"])], None);
        b.push(first);
        b.push(second);
        assert!(consistency(&b.build(), DefaultScheme::Global).is_empty());
    }

    #[test]
    fn test_override_is_rewritten_through_base_args() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A"]);
        let base_method = b.virtual_method("m", vec![], vec![writes(&["Q"])], None);
        let base_class = b.class("B", vec![params(&["Q"])], vec![], vec![base_method]);
        b.push(base_class);
        let good = b.function("m", vec![], vec![writes(&["P:A"])], None);
        let good_class = b.class("D", vec![params(&["P"]), base_arg("B", &["P:A"])], vec![base("B")], vec![good]);
        b.push(good_class);
        let bad = b.function("m", vec![], vec![writes(&["P"])], None);
        let bad_class = b.class("E", vec![params(&["P"]), base_arg("B", &["P:A"])], vec![base("B")], vec![bad]);
        b.push(bad_class);
        let diagnostics = consistency(&b.build(), DefaultScheme::Global);
        assert_eq!(diagnostics.count(Category::OverrideEffectViolation), 1);
        assert!(diagnostics.iter().next().unwrap().message.contains("`E::m`"));
    }

    #[test]
    fn test_nearest_override_only() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A", "B"]);
        let top = b.virtual_method("m", vec![], vec![writes(&["A"])], None);
        let top_class = b.class("Top", vec![], vec![], vec![top]);
        b.push(top_class);
        let mid = b.virtual_method("m", vec![], vec![writes(&["B"])], None);
        let mid_class = b.class("Mid", vec![], vec![base("Top")], vec![mid]);
        b.push(mid_class);
        let leaf = b.function("m", vec![], vec![writes(&["B"])], None);
        let leaf_class = b.class("Leaf", vec![], vec![base("Mid")], vec![leaf]);
        b.push(leaf_class);
        let diagnostics = consistency(&b.build(), DefaultScheme::Global);
        // Mid violates Top; Leaf is only checked against Mid.
        assert_eq!(diagnostics.count(Category::OverrideEffectViolation), 1);
        assert!(diagnostics.iter().next().unwrap().message.contains("`Mid::m`"));
    }
}
