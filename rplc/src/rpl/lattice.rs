//! Inclusion, overlap and least upper bound on RPLs.
//!
//! `a ⊑ b` holds when `b`, read as a pattern, matches a prefix of `a`: every
//! element of `b` must equal the corresponding element of `a`, except that a
//! `*` in `b` absorbs any run of elements of `a` (including an empty one).
//! A `*` in `a` stands for an unknown run and is only absorbed by a `*` in
//! `b`. Because matching is against a prefix, nested regions are included in
//! their parents (`Root:A:B ⊑ Root:A`).
//!
//! Before matching, both sides are rooted: `Global:X` and `Rx` are read as
//! `Root:Global:X` and `Root:Rx`, and a parameter or inference variable head
//! is read as `Root:*` (some unknown region under `Root`). Two RPLs headed by
//! the *same* parameter are compared without rooting so `P:A ⊑ P` holds while
//! `P:A ⊑ Q` does not.
//!
//! `Local` is outside the hierarchy. Paths under it (`Local:x`, one per
//! automatic variable) are compared among themselves, without rooting, and
//! are never related to a rooted path.

use std::borrow::Cow;

use super::{Rpl, RplElement, SpecialRegion};

/// Whether `a ⊑ b`.
pub fn is_included_in(a: &Rpl, b: &Rpl) -> bool {
    if a.is_local() || b.is_local() {
        return a.is_local() && b.is_local() && prefix_match(a.elements(), b.elements());
    }

    if b.head().is_abstract() {
        // Nothing but the same parameter is known to be inside `P`.
        return a.head() == b.head() && prefix_match(a.tail(), b.tail());
    }
    if a.head().is_abstract() && a.head() == b.head() {
        return prefix_match(a.tail(), b.tail());
    }

    prefix_match(&rooted(a), &rooted(b))
}

/// Whether `a` and `b` may denote a common region.
///
/// This is symmetric and holds whenever either side includes the other. It
/// is also true when two wildcard paths can be instantiated to the same
/// region (`Root:*:X` and `Root:A:*` both denote `Root:A:X`), and when two
/// different parameters are compared, since they may be bound to the same
/// region by a caller.
pub fn overlaps(a: &Rpl, b: &Rpl) -> bool {
    if a.is_local() || b.is_local() {
        return a.is_local() && b.is_local() && intersect(a.elements(), b.elements());
    }
    if is_included_in(a, b) || is_included_in(b, a) {
        return true;
    }
    if a.head().is_abstract() && a.head() == b.head() {
        return intersect(a.tail(), b.tail());
    }
    intersect(&rooted(a), &rooted(b))
}

/// The least upper bound of two RPLs, used when solving region variables.
///
/// Returns `None` when exactly one side is under `Local`, which shares no
/// upper bound with the rooted hierarchy.
pub fn lub(a: &Rpl, b: &Rpl) -> Option<Rpl> {
    if is_included_in(a, b) {
        return Some(b.clone());
    }
    if is_included_in(b, a) {
        return Some(a.clone());
    }
    if a.is_local() != b.is_local() {
        return None;
    }

    if a.head() != b.head() {
        return Some(Rpl::everything());
    }

    let common: Vec<RplElement> = a
        .elements()
        .iter()
        .zip(b.elements())
        .take_while(|(x, y)| x == y && **x != RplElement::Star)
        .map(|(x, _)| x.clone())
        .collect();
    let mut elements = common;
    elements.push(RplElement::Star);
    Some(Rpl::new(elements))
}

/// The rooted spelling of an RPL.
fn rooted(rpl: &Rpl) -> Cow<'_, [RplElement]> {
    let root = RplElement::Special(SpecialRegion::Root);
    match rpl.head() {
        RplElement::Special(SpecialRegion::Root) | RplElement::Special(SpecialRegion::Local) => {
            Cow::Borrowed(rpl.elements())
        }
        RplElement::Special(SpecialRegion::Global) | RplElement::Region(_) => {
            let mut elements = Vec::with_capacity(rpl.len() + 1);
            elements.push(root);
            elements.extend_from_slice(rpl.elements());
            Cow::Owned(elements)
        }
        RplElement::Param(_) | RplElement::Var(_) | RplElement::Star => {
            let mut elements = Vec::with_capacity(rpl.len() + 1);
            elements.push(root);
            elements.push(RplElement::Star);
            elements.extend_from_slice(rpl.tail());
            Cow::Owned(elements)
        }
    }
}

/// Whether the pattern `pattern` matches some prefix of `path`.
fn prefix_match(path: &[RplElement], pattern: &[RplElement]) -> bool {
    match pattern.split_first() {
        None => true,
        Some((RplElement::Star, rest)) => (0..=path.len()).any(|k| prefix_match(&path[k..], rest)),
        Some((element, rest)) => match path.split_first() {
            Some((first, path_rest)) if first == element => prefix_match(path_rest, rest),
            _ => false,
        },
    }
}

/// Whether two prefix-closed patterns share an instance.
fn intersect(p: &[RplElement], q: &[RplElement]) -> bool {
    match (p.split_first(), q.split_first()) {
        (None, _) | (_, None) => true,
        (Some((RplElement::Star, p_rest)), _) => intersect(p_rest, q) || intersect(p, &q[1..]),
        (_, Some((RplElement::Star, q_rest))) => intersect(p, q_rest) || intersect(&p[1..], q),
        (Some((x, p_rest)), Some((y, q_rest))) => x == y && intersect(p_rest, q_rest),
    }
}
