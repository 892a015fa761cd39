//! Algebraic properties of the RPL lattice and effect coverage.

use proptest::prelude::*;
use rplc::effects::{Effect, EffectKind, EffectSet};
use rplc::hir::DeclId;
use rplc::rpl::{
    is_included_in, lub, overlaps, ParamName, RegionName, RegionVarId, Rpl, RplElement, Scope, SpecialRegion,
};
use rplc::span::Span;
use rplc::subst::Substitution;

fn param() -> ParamName {
    ParamName::new("P", DeclId(1))
}

fn other_param() -> ParamName {
    ParamName::new("Q", DeclId(1))
}

fn region(name: &str) -> RplElement {
    RplElement::Region(RegionName::new(name, Scope::Global))
}

fn tail_element() -> impl Strategy<Value = RplElement> {
    prop_oneof![
        Just(region("A")),
        Just(region("B")),
        Just(region("C")),
        Just(RplElement::Star),
    ]
}

fn tail() -> impl Strategy<Value = Vec<RplElement>> {
    prop::collection::vec(tail_element(), 0..4)
}

/// RPLs without `Local` or parameters.
fn concrete_rpl() -> impl Strategy<Value = Rpl> {
    let head = prop_oneof![
        Just(RplElement::Special(SpecialRegion::Root)),
        Just(RplElement::Special(SpecialRegion::Global)),
        Just(region("A")),
        Just(region("B")),
    ];
    (head, tail()).prop_map(|(head, tail)| {
        let mut elements = vec![head];
        elements.extend(tail);
        Rpl::new(elements)
    })
}

/// Heads that stand for an unknown region.
fn abstract_head() -> impl Strategy<Value = Rpl> {
    prop_oneof![
        Just(Rpl::param(param())),
        Just(Rpl::param(other_param())),
        Just(Rpl::var(RegionVarId(0))),
    ]
}

fn local_rpl() -> impl Strategy<Value = Rpl> {
    prop_oneof![
        Just(Rpl::local()),
        Just(Rpl::local_var("x", DeclId(2))),
        Just(Rpl::local_var("y", DeclId(3))),
    ]
}

fn rpl() -> impl Strategy<Value = Rpl> {
    prop_oneof![
        6 => concrete_rpl(),
        3 => (abstract_head(), tail()).prop_map(|(head, tail)| head.append(&tail)),
        1 => local_rpl(),
    ]
}

fn effect() -> impl Strategy<Value = Effect> {
    (any::<bool>(), rpl()).prop_map(|(write, rpl)| {
        let kind = if write { EffectKind::Write } else { EffectKind::Read };
        Effect::new(kind, rpl)
    })
}

proptest! {
    #[test]
    fn inclusion_is_reflexive(a in rpl()) {
        prop_assert!(is_included_in(&a, &a));
    }

    #[test]
    fn inclusion_is_transitive(a in rpl(), b in rpl(), c in rpl()) {
        if is_included_in(&a, &b) && is_included_in(&b, &c) {
            prop_assert!(is_included_in(&a, &c), "{a} ⊑ {b} ⊑ {c}");
        }
    }

    #[test]
    fn extension_stays_inside(c in rpl(), t1 in tail(), t2 in tail()) {
        let b = c.append(&t1);
        let a = b.append(&t2);
        prop_assert!(is_included_in(&b, &c));
        prop_assert!(is_included_in(&a, &b));
        prop_assert!(is_included_in(&a, &c));
    }

    #[test]
    fn everything_but_local_is_under_root_star(a in rpl()) {
        prop_assert_eq!(is_included_in(&a, &Rpl::everything()), !a.is_local());
    }

    #[test]
    fn overlap_is_symmetric_and_follows_inclusion(a in rpl(), b in rpl()) {
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
        if is_included_in(&a, &b) {
            prop_assert!(overlaps(&a, &b));
        }
    }

    #[test]
    fn lub_is_an_upper_bound(a in rpl(), b in rpl()) {
        match lub(&a, &b) {
            Some(l) => {
                prop_assert!(is_included_in(&a, &l), "{a} ⋢ {l}");
                prop_assert!(is_included_in(&b, &l), "{b} ⋢ {l}");
            }
            None => prop_assert!(a.is_local() != b.is_local()),
        }
    }

    #[test]
    fn substitution_preserves_inclusion(a in rpl(), b in rpl(), target in concrete_rpl()) {
        let subst = Substitution::new().with(param(), target);
        if is_included_in(&a, &b) {
            let (sa, sb) = (subst.apply(&a), subst.apply(&b));
            prop_assert!(is_included_in(&sa, &sb), "{a} ⊑ {b} but {sa} ⋢ {sb}");
        }
    }

    #[test]
    fn effect_set_covers_everything_inserted(effects in prop::collection::vec(effect(), 0..12)) {
        let mut set = EffectSet::new();
        for effect in &effects {
            set.insert(effect.clone(), Span::dummy());
        }
        for effect in &effects {
            prop_assert!(set.covers(effect), "{effect} lost");
        }
        let members: Vec<&Effect> = set.effects().collect();
        for (i, x) in members.iter().enumerate() {
            for (j, y) in members.iter().enumerate() {
                if i != j {
                    prop_assert!(!x.is_covered_by(y), "{x} is redundant next to {y}");
                }
            }
        }
    }

    #[test]
    fn adding_effects_keeps_coverage(
        effects in prop::collection::vec(effect(), 1..8),
        extra in effect(),
    ) {
        let mut set = EffectSet::new();
        for effect in &effects {
            set.insert(effect.clone(), Span::dummy());
        }
        let before: Vec<Effect> = effects.iter().filter(|e| set.covers(e)).cloned().collect();
        set.insert(extra, Span::dummy());
        for effect in &before {
            prop_assert!(set.covers(effect));
        }
    }
}
