//! End-to-end checks of small annotated programs.

mod common;

use pretty_assertions::assert_eq;
use rplc::hir::build::*;
use rplc::hir::Type;
use rplc::{Category, DefaultScheme, Payload};

use common::{only, payload_effects, render, run};

#[test]
fn test_method_write_not_covered_by_read_summary() {
    let mut b = ProgramBuilder::new();
    let field = b.field("x", Type::Scalar, vec![arg(&["P"])]);
    let body = block(vec![b.stmt(assign(name("x"), lit()))]);
    let method = b.function("set", vec![], vec![reads(&["P"])], Some(body));
    let class = b.class("C", vec![params(&["P"])], vec![], vec![field, method]);
    b.push(class);

    let outcome = run(&b.build(), DefaultScheme::Global);
    assert_eq!(outcome.diagnostics.len(), 1, "{}", render(&outcome));
    let diagnostic = &outcome.diagnostics[0];
    assert_eq!(diagnostic.category, Category::EffectNotCovered);
    assert_eq!(payload_effects(&diagnostic.payload), vec!["writes(P)"]);
    assert!(outcome.has_errors());
}

#[test]
fn test_no_effect_function_writing_default_global() {
    let mut b = ProgramBuilder::new();
    let counter = b.var("counter", Type::Scalar, vec![]);
    b.push(counter);
    let body = block(vec![b.stmt(assign(name("counter"), lit()))]);
    let f = b.function("reset", vec![], vec![no_effect()], Some(body));
    b.push(f);

    let outcome = run(&b.build(), DefaultScheme::Global);
    assert_eq!(outcome.diagnostics.len(), 1, "{}", render(&outcome));
    assert_eq!(outcome.count(Category::EffectNotCovered), 1);
    assert_eq!(payload_effects(&outcome.diagnostics[0].payload), vec!["writes(Global)"]);
}

#[test]
fn test_override_widening_summary() {
    let mut b = ProgramBuilder::new();
    b.regions(&["Class"]);
    let base_method = b.virtual_method("get", vec![], vec![reads(&["Class"])], None);
    let base_class = b.class("Base", vec![], vec![], vec![base_method]);
    b.push(base_class);
    let derived_method = b.function("get", vec![], vec![writes(&["Class"])], None);
    let derived = b.class("Derived", vec![], vec![base("Base")], vec![derived_method]);
    b.push(derived);

    let outcome = run(&b.build(), DefaultScheme::Global);
    assert_eq!(outcome.diagnostics.len(), 1, "{}", render(&outcome));
    assert_eq!(outcome.count(Category::OverrideEffectViolation), 1);
    assert_eq!(payload_effects(&outcome.diagnostics[0].payload), vec!["writes(Class)"]);
}

fn fork_join_program(second_reads: &str) -> rplc::hir::Program {
    let mut b = ProgramBuilder::new();
    b.regions(&["Left", "Right"]);
    let a = b.var("a", Type::Scalar, vec![arg(&["Left"])]);
    let c = b.var("c", Type::Scalar, vec![arg(&["Right"])]);
    b.push(a);
    b.push(c);
    let body = block(vec![b.stmt(call(
        "tbb::parallel_invoke",
        vec![
            lambda(vec![expr_stmt(assign(name("a"), lit()))]),
            lambda(vec![expr_stmt(binary(name(second_reads), lit()))]),
        ],
    ))]);
    let main = b.function("main", vec![], vec![writes(&["Root:*"])], Some(body));
    b.push(main);
    b.build()
}

#[test]
fn test_fork_join_on_disjoint_regions() {
    let outcome = run(&fork_join_program("c"), DefaultScheme::Global);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
}

#[test]
fn test_fork_join_on_shared_region() {
    let outcome = run(&fork_join_program("a"), DefaultScheme::Global);
    assert_eq!(outcome.diagnostics.len(), 1, "{}", render(&outcome));
    let conflicts = only(&outcome, Category::Interference);
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(conflicts[0].payload, Payload::Conflict { .. }));
    assert_eq!(payload_effects(&conflicts[0].payload), vec!["writes(Left)", "reads(Left)"]);
}

#[test]
fn test_inferred_write_to_local_array() {
    let mut b = ProgramBuilder::new();
    let array = b.local("a", Type::array(Type::Scalar), vec![], None);
    let write = b.stmt(assign(index(name("a"), lit()), lit()));
    let f = b.function("fill", vec![], vec![], Some(block(vec![array, write])));
    b.push(f);

    let outcome = run(&b.build(), DefaultScheme::Inference);
    assert_eq!(outcome.diagnostics.len(), 1, "{}", render(&outcome));
    let notes = only(&outcome, Category::InferredSummary);
    assert_eq!(notes.len(), 1);
    assert_eq!(payload_effects(&notes[0].payload), vec!["writes(rgn_a)"]);
    assert!(matches!(notes[0].payload, Payload::Inferred { best_effort: false, .. }));
    assert_eq!(outcome.summaries["fill"].to_string(), "writes(rgn_a)");
    assert!(!outcome.has_errors());
}

#[test]
fn test_param_scheme_defaults_to_class_parameter() {
    let mut b = ProgramBuilder::new();
    let field = b.field("x", Type::Scalar, vec![]);
    let body = block(vec![b.stmt(increment(name("x")))]);
    let method = b.function("bump", vec![], vec![], Some(body));
    let class = b.class("C", vec![params(&["P"])], vec![], vec![field, method]);
    b.push(class);

    let outcome = run(&b.build(), DefaultScheme::Param);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
    assert_eq!(outcome.summaries["C::bump"].to_string(), "writes(P), writes(Global)");
}

#[test]
fn test_inherited_field_through_base_args() {
    let mut b = ProgramBuilder::new();
    b.regions(&["A"]);
    let field = b.field("v", Type::Scalar, vec![arg(&["Q"])]);
    let base_class = b.class("B", vec![params(&["Q"])], vec![], vec![field]);
    b.push(base_class);
    let body = block(vec![b.stmt(assign(name("v"), lit()))]);
    let method = b.function("set", vec![], vec![writes(&["P:A"])], Some(body));
    let derived = b.class(
        "D",
        vec![params(&["P"]), base_arg("B", &["P:A"])],
        vec![base("B")],
        vec![method],
    );
    b.push(derived);

    let outcome = run(&b.build(), DefaultScheme::Global);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
}

#[test]
fn test_call_through_object_substitutes_class_args() {
    let mut b = ProgramBuilder::new();
    b.regions(&["A", "B"]);
    let field = b.field("v", Type::Scalar, vec![arg(&["P"])]);
    let body = block(vec![b.stmt(assign(name("v"), lit()))]);
    let set = b.function("set", vec![], vec![writes(&["P"])], Some(body));
    let class = b.class("Cell", vec![params(&["P"])], vec![], vec![field, set]);
    b.push(class);
    let cell = b.var("cell", Type::class("Cell"), vec![arg(&["Global", "A"])]);
    b.push(cell);
    let caller_body = block(vec![b.stmt(method_call(name("cell"), "set", vec![]))]);
    let ok = b.function("ok", vec![], vec![writes(&["A"])], Some(caller_body.clone()));
    let bad = b.function("bad", vec![], vec![writes(&["B"])], Some(caller_body));
    b.push(ok);
    b.push(bad);

    let outcome = run(&b.build(), DefaultScheme::Global);
    let uncovered = only(&outcome, Category::EffectNotCovered);
    assert_eq!(uncovered.len(), 1, "{}", render(&outcome));
    assert_eq!(payload_effects(&uncovered[0].payload), vec!["writes(A)"]);
    assert!(uncovered[0].message.contains("`bad`"));
}

#[test]
fn test_undeclared_region_is_reported_once() {
    let mut b = ProgramBuilder::new();
    let x = b.var("x", Type::Scalar, vec![arg(&["Nowhere"])]);
    b.push(x);
    let outcome = run(&b.build(), DefaultScheme::Global);
    assert_eq!(outcome.count(Category::RplElementUndeclared), 1, "{}", render(&outcome));
}

#[test]
fn test_unknown_scheme() {
    let mut b = ProgramBuilder::new();
    let f = b.function("f", vec![], vec![], Some(block(vec![])));
    b.push(f);
    let config = rplc::CheckerConfig {
        default_scheme: "everything-goes".to_string(),
        ..rplc::CheckerConfig::default()
    };
    let outcome = rplc::check_program(&b.build(), &config);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].category, Category::InvalidConfiguration);
    assert!(outcome.summaries.is_empty());
}

#[test]
fn test_static_local_in_parameterized_method_lives_in_global() {
    for scheme in [DefaultScheme::Global, DefaultScheme::Param] {
        let mut b = ProgramBuilder::new();
        let calls = b.static_local("calls", Type::Scalar, vec![]);
        let bump = b.stmt(increment(name("calls")));
        let method = b.function("count", vec![], vec![writes(&["P"])], Some(block(vec![calls, bump])));
        let class = b.class("Counter", vec![params(&["P"])], vec![], vec![method]);
        b.push(class);

        let outcome = run(&b.build(), scheme);
        assert_eq!(outcome.diagnostics.len(), 1, "{scheme}: {}", render(&outcome));
        assert_eq!(outcome.count(Category::EffectNotCovered), 1);
        assert_eq!(outcome.count(Category::MissingRegionArgument), 0);
        assert_eq!(payload_effects(&outcome.diagnostics[0].payload), vec!["writes(Global)"]);
    }
}
