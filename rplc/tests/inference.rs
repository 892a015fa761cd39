//! Region and effect inference through the full pipeline.

mod common;

use pretty_assertions::assert_eq;
use rplc::hir::build::*;
use rplc::hir::{Attribute, Program, Type};
use rplc::{Category, DefaultScheme, Payload};

use common::{only, payload_effects, render, run};

/// `x` in `A`, `y` in `B`, and a function that writes `x` and reads `y`.
fn two_regions(clauses: Vec<Attribute>) -> Program {
    let mut b = ProgramBuilder::new();
    b.regions(&["A", "B"]);
    let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
    let y = b.var("y", Type::Scalar, vec![arg(&["B"])]);
    b.push(x);
    b.push(y);
    let body = block(vec![b.stmt(assign(name("x"), name("y")))]);
    let f = b.function("f", vec![], clauses, Some(body));
    b.push(f);
    b.build()
}

#[test]
fn test_inferred_summary_covers_its_body_when_written_back() {
    let inferred = run(&two_regions(vec![]), DefaultScheme::EffectInference);
    let summary = inferred.summaries["f"].to_string();
    assert_eq!(summary, "reads(B), writes(A)");

    let annotated = two_regions(vec![reads(&["B"]), writes(&["A"])]);
    let checked = run(&annotated, DefaultScheme::Global);
    assert!(checked.diagnostics.is_empty(), "{}", render(&checked));
    assert_eq!(checked.summaries["f"].to_string(), summary);
}

#[test]
fn test_repeated_runs_agree() {
    let program = two_regions(vec![]);
    let first = run(&program, DefaultScheme::Inference);
    let second = run(&program, DefaultScheme::Inference);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.summaries, second.summaries);
}

#[test]
fn test_self_recursion_terminates() {
    let mut b = ProgramBuilder::new();
    b.regions(&["A"]);
    let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
    b.push(x);
    let body = block(vec![b.stmt(increment(name("x"))), b.stmt(call("spin", vec![]))]);
    let spin = b.function("spin", vec![], vec![], Some(body));
    b.push(spin);

    let outcome = run(&b.build(), DefaultScheme::Inference);
    assert_eq!(outcome.summaries["spin"].to_string(), "writes(A)");
    assert!(!outcome.summaries["spin"].is_best_effort());
}

#[test]
fn test_long_call_chain_propagates() {
    const DEPTH: usize = 2_000;
    let mut b = ProgramBuilder::new();
    b.regions(&["A"]);
    let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
    b.push(x);
    let leaf_body = block(vec![b.stmt(assign(name("x"), lit()))]);
    let leaf = b.function("f0", vec![], vec![], Some(leaf_body));
    b.push(leaf);
    for i in 1..DEPTH {
        let body = block(vec![b.stmt(call(&format!("f{}", i - 1), vec![]))]);
        let f = b.function(&format!("f{i}"), vec![], vec![], Some(body));
        b.push(f);
    }

    let outcome = run(&b.build(), DefaultScheme::EffectInference);
    assert_eq!(outcome.count(Category::InferredSummary), DEPTH);
    assert_eq!(outcome.summaries[format!("f{}", DEPTH - 1).as_str()].to_string(), "writes(A)");
}

#[test]
fn test_pointer_region_inferred_from_address() {
    let mut b = ProgramBuilder::new();
    b.regions(&["A"]);
    let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
    b.push(x);
    let p = b.local("p", Type::pointer(Type::Scalar), vec![], Some(addr(name("x"))));
    let write = b.stmt(assign(deref(name("p")), lit()));
    let f = b.function("store", vec![], vec![], Some(block(vec![p, write])));
    b.push(f);

    let outcome = run(&b.build(), DefaultScheme::Inference);
    let notes = only(&outcome, Category::InferredSummary);
    assert_eq!(notes.len(), 1, "{}", render(&outcome));
    assert_eq!(payload_effects(&notes[0].payload), vec!["writes(A)"]);
}

#[test]
fn test_region_inference_keeps_default_summary() {
    let mut b = ProgramBuilder::new();
    b.regions(&["A"]);
    let x = b.var("x", Type::Scalar, vec![arg(&["A"])]);
    b.push(x);
    let p = b.local("p", Type::pointer(Type::Scalar), vec![], Some(addr(name("x"))));
    let write = b.stmt(assign(deref(name("p")), lit()));
    let f = b.function("store", vec![], vec![], Some(block(vec![p, write])));
    b.push(f);

    let outcome = run(&b.build(), DefaultScheme::RegionInference);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
    assert_eq!(outcome.summaries["store"].to_string(), "writes(Root:*)");
}

#[test]
fn test_external_callee_makes_caller_best_effort() {
    let mut b = ProgramBuilder::new();
    let external = b.function("external", vec![], vec![], None);
    let body = block(vec![b.stmt(call("external", vec![]))]);
    let caller = b.function("caller", vec![], vec![], Some(body));
    b.push(external);
    b.push(caller);

    let outcome = run(&b.build(), DefaultScheme::Inference);
    let notes = only(&outcome, Category::InferredSummary);
    assert_eq!(notes.len(), 1);
    assert!(matches!(notes[0].payload, Payload::Inferred { best_effort: true, .. }));
    assert!(outcome.summaries["external"].is_best_effort());
}

#[test]
fn test_declared_summaries_are_not_inferred() {
    let outcome = run(&two_regions(vec![writes(&["Root:*"])]), DefaultScheme::Inference);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
    assert!(outcome.summaries["f"].is_declared());
}
