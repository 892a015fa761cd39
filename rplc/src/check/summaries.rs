//! Effect contracts of canonical functions before inference.
//!
//! Explicit clauses win. Without them, an override of a virtual method
//! inherits the overridden summaries, and anything else falls back to the
//! scheme's default. Under the effect-inferring schemes unannotated
//! functions stay pending until [`crate::infer`] runs.

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::bind::DeclaredEffects;
use super::CheckContext;
use crate::config::DefaultScheme;
use crate::effects::{Effect, EffectSummary, SummaryOrigin};
use crate::hir::DeclId;
use crate::rpl::Rpl;
use crate::subst::Substitution;

/// Summaries keyed by canonical function.
pub type Summaries = IndexMap<DeclId, EffectSummary>;

/// A virtual method overridden by a function, seen from the overrider.
#[derive(Debug, Clone)]
pub struct Overridden {
    pub method: DeclId,
    /// Rewrites the overridden method's summary into the overrider's vocabulary.
    pub subst: Substitution,
}

/// The nearest virtual method with the same name and signature on each
/// inheritance path above the class of `function`.
pub fn overridden_methods(cx: &CheckContext<'_, '_>, function: DeclId) -> Vec<Overridden> {
    let index = cx.index;
    let (Some(class), Some(decl), Some(info)) = (
        index.owner_class(function),
        index.function(function),
        index.get(function),
    ) else {
        return Vec::new();
    };
    if decl.is_static {
        return Vec::new();
    }
    let signature = decl.signature();
    let virtual_method = |candidate_class: DeclId| {
        index.methods(candidate_class, &info.name).into_iter().find(|&method| {
            index
                .function(method)
                .is_some_and(|m| m.is_virtual && m.signature() == signature)
        })
    };

    let mut overridden = Vec::new();
    for base_class in cx.graph.nearest_on_each_path(class, |c| virtual_method(c).is_some()) {
        let Some(method) = virtual_method(base_class) else {
            continue;
        };
        let path = cx.graph.path_substitution(class, base_class).unwrap_or_default();
        let own = cx.bindings.function_params(function);
        let rename = Substitution::positional(
            cx.bindings.function_params(method),
            own.iter().map(|p| Rpl::param(p.clone())),
        );
        overridden.push(Overridden {
            method,
            subst: rename.union(&path),
        });
    }
    overridden
}

/// The `writes` a scheme assumes for an unannotated function, or `None`
/// when the scheme infers it.
pub fn default_effects(cx: &CheckContext<'_, '_>, function: DeclId) -> Option<Vec<Effect>> {
    match cx.scheme {
        DefaultScheme::Global | DefaultScheme::Simple => Some(vec![Effect::write(Rpl::global())]),
        DefaultScheme::Param => {
            let mut effects = Vec::new();
            if let Some(class) = cx.index.owner_class(function) {
                for owner in std::iter::once(class).chain(cx.index.outer_classes(class)) {
                    effects.extend(cx.bindings.class_params(owner).iter().map(|p| Effect::write(Rpl::param(p.clone()))));
                }
            }
            effects.extend(
                cx.bindings
                    .function_params(function)
                    .iter()
                    .map(|p| Effect::write(Rpl::param(p.clone()))),
            );
            effects.push(Effect::write(Rpl::global()));
            Some(effects)
        }
        // Region inference alone has no effect inference to fall back on.
        DefaultScheme::RegionInference => Some(vec![Effect::write(Rpl::everything())]),
        DefaultScheme::EffectInference | DefaultScheme::Inference => None,
    }
}

/// Contracts for every canonical function whose summary is known up front.
pub fn initial_summaries(cx: &CheckContext<'_, '_>) -> Summaries {
    // Shallow classes first so inherited summaries are available.
    let mut order: Vec<DeclId> = cx.index.canonical_functions().to_vec();
    order.sort_by_key(|f| cx.index.owner_class(*f).map_or(0, |c| cx.graph.depth(c)));

    let mut found = Summaries::default();
    for function in order {
        if let Some(summary) = initial_summary(cx, function, &found) {
            trace!(function = %cx.index.function_key(function), %summary, "initial summary");
            found.insert(function, summary);
        }
    }

    let summaries: Summaries = cx
        .index
        .canonical_functions()
        .iter()
        .filter_map(|f| found.get(f).map(|s| (*f, s.clone())))
        .collect();
    debug!(
        known = summaries.len(),
        pending = cx.index.canonical_functions().len() - summaries.len(),
        "initial summaries"
    );
    summaries
}

fn initial_summary(cx: &CheckContext<'_, '_>, function: DeclId, known: &Summaries) -> Option<EffectSummary> {
    match cx.bindings.table.effects(function) {
        Some(DeclaredEffects::Pure) => return Some(EffectSummary::pure()),
        Some(DeclaredEffects::Effects(effects)) => return Some(EffectSummary::declared(effects.clone())),
        None => {}
    }
    if !cx.scheme.infers_effects() {
        let overridden = overridden_methods(cx, function);
        if !overridden.is_empty() {
            let inherited: Vec<Effect> = overridden
                .iter()
                .filter_map(|o| known.get(&o.method).map(|s| o.subst.apply_summary(s)))
                .flat_map(|s| s.effects().to_vec())
                .collect();
            return Some(EffectSummary::with_origin(inherited, SummaryOrigin::Inherited));
        }
    }
    default_effects(cx, function).map(EffectSummary::defaulted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::testing::context_for;
    use crate::hir::build::*;
    use crate::hir::Type;

    #[test]
    fn test_declared_and_pure() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A"]);
        let f = b.function("f", vec![], vec![reads(&["A"])], None);
        let g = b.function("g", vec![], vec![no_effect()], None);
        let (f_id, g_id) = (b.push(f), b.push(g));
        let (summaries, _) = context_for(&b.build(), DefaultScheme::Global, |cx, _| initial_summaries(cx));
        assert_eq!(summaries[&f_id].to_string(), "reads(A)");
        assert!(summaries[&g_id].is_pure());
    }

    #[test]
    fn test_defaults_per_scheme() {
        let mut b = ProgramBuilder::new();
        let field = b.field("x", Type::Scalar, vec![]);
        let method = b.function("m", vec![], vec![], None);
        let method_id = method.id;
        let class = b.class("C", vec![params(&["P"])], vec![], vec![field, method]);
        b.push(class);
        let program = b.build();

        let (global, _) = context_for(&program, DefaultScheme::Global, |cx, _| initial_summaries(cx));
        assert_eq!(global[&method_id].to_string(), "writes(Global)");

        let (param, _) = context_for(&program, DefaultScheme::Param, |cx, _| initial_summaries(cx));
        assert_eq!(param[&method_id].to_string(), "writes(P), writes(Global)");

        let (inferred, _) = context_for(&program, DefaultScheme::Inference, |cx, _| initial_summaries(cx));
        assert!(!inferred.contains_key(&method_id));
    }

    #[test]
    fn test_override_inherits_base_summary() {
        let mut b = ProgramBuilder::new();
        b.regions(&["A"]);
        let base_method = b.virtual_method("m", vec![], vec![reads(&["Q"])], None);
        let base_class = b.class("B", vec![params(&["Q"])], vec![], vec![base_method]);
        b.push(base_class);
        let derived_method = b.function("m", vec![], vec![], None);
        let derived_id = derived_method.id;
        let derived = b.class(
            "D",
            vec![params(&["P"]), base_arg("B", &["P:A"])],
            vec![base("B")],
            vec![derived_method],
        );
        b.push(derived);
        let (summaries, _) = context_for(&b.build(), DefaultScheme::Global, |cx, _| initial_summaries(cx));
        let summary = &summaries[&derived_id];
        assert_eq!(summary.origin(), SummaryOrigin::Inherited);
        assert_eq!(summary.to_string(), "reads(P:A)");
    }
}
