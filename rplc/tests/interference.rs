mod common;

use pretty_assertions::assert_eq;
use rplc::config::{ForkJoinPattern, ForkJoinShape};
use rplc::hir::build::*;
use rplc::hir::{Attribute, Expr, Program, Type};
use rplc::{check_program, Category, CheckerConfig, DefaultScheme};

use common::{only, payload_effects, render, run};

/// Globals `a` in `Left` and `c` in `Right`, two helpers with the given
/// clauses, and `main` making `call`.
fn program(left: Vec<Attribute>, right: Vec<Attribute>, call_expr: Expr) -> Program {
    let mut b = ProgramBuilder::new();
    b.regions(&["Left", "Right"]);
    let a = b.var("a", Type::Scalar, vec![arg(&["Left"])]);
    let c = b.var("c", Type::Scalar, vec![arg(&["Right"])]);
    b.push(a);
    b.push(c);
    let left = b.function("left", vec![], left, None);
    let right = b.function("right", vec![], right, None);
    b.push(left);
    b.push(right);
    let body = block(vec![b.stmt(call_expr)]);
    let main = b.function("main", vec![], vec![writes(&["Root:*"])], Some(body));
    b.push(main);
    b.build()
}

fn invoke(operands: Vec<Expr>) -> Expr {
    call("tbb::parallel_invoke", operands)
}

#[test]
fn test_function_operands_on_disjoint_regions() {
    let p = program(
        vec![writes(&["Left"])],
        vec![writes(&["Right"])],
        invoke(vec![name("left"), name("right")]),
    );
    let outcome = run(&p, DefaultScheme::Global);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
}

#[test]
fn test_function_operands_writing_same_region() {
    let p = program(
        vec![writes(&["Left"])],
        vec![reads(&["Left"]), writes(&["Right"])],
        invoke(vec![name("left"), name("right")]),
    );
    let outcome = run(&p, DefaultScheme::Global);
    let conflicts = only(&outcome, Category::Interference);
    assert_eq!(conflicts.len(), 1, "{}", render(&outcome));
    assert_eq!(payload_effects(&conflicts[0].payload), vec!["writes(Left)", "reads(Left)"]);
}

#[test]
fn test_reads_never_interfere() {
    let p = program(
        vec![reads(&["Left"])],
        vec![reads(&["Left"])],
        invoke(vec![name("left"), name("right")]),
    );
    let outcome = run(&p, DefaultScheme::Global);
    assert_eq!(outcome.count(Category::Interference), 0);
}

#[test]
fn test_each_conflicting_pair_reported_once() {
    let p = program(
        vec![writes(&["Left"])],
        vec![writes(&["Right"])],
        invoke(vec![
            name("left"),
            name("right"),
            lambda(vec![expr_stmt(binary(name("a"), name("c")))]),
        ]),
    );
    let outcome = run(&p, DefaultScheme::Global);
    let conflicts = only(&outcome, Category::Interference);
    assert_eq!(conflicts.len(), 2, "{}", render(&outcome));
    assert!(conflicts[0].message.contains("operands 1 and 3"));
    assert!(conflicts[1].message.contains("operands 2 and 3"));
}

#[test]
fn test_parallel_for_body_writing_shared_state() {
    let p = program(
        vec![],
        vec![],
        call(
            "tbb::parallel_for",
            vec![lit(), lit(), lambda(vec![expr_stmt(increment(name("a")))])],
        ),
    );
    let outcome = run(&p, DefaultScheme::Global);
    let conflicts = only(&outcome, Category::Interference);
    assert_eq!(conflicts.len(), 1, "{}", render(&outcome));
    assert!(conflicts[0].message.contains("iterations"));
}

#[test]
fn test_parallel_for_body_reading_shared_state() {
    let p = program(
        vec![],
        vec![],
        call(
            "tbb::parallel_for",
            vec![lit(), lit(), lambda(vec![expr_stmt(binary(name("a"), name("c")))])],
        ),
    );
    let outcome = run(&p, DefaultScheme::Global);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
}

#[test]
fn test_configured_fork_join_primitive() {
    let p = program(
        vec![writes(&["Left"])],
        vec![writes(&["Left"])],
        call("pool::both", vec![name("left"), name("right")]),
    );
    let mut config = CheckerConfig::with_scheme(DefaultScheme::Global);
    config.fork_join.push(ForkJoinPattern {
        callee: "pool::both".to_string(),
        shape: ForkJoinShape::Invoke,
    });
    let outcome = check_program(&p, &config);
    assert_eq!(outcome.count(Category::Interference), 1, "{}", render(&outcome));
}

#[test]
fn test_literal_operand_is_rejected() {
    let p = program(vec![], vec![], invoke(vec![name("left"), lit()]));
    let outcome = run(&p, DefaultScheme::Global);
    assert_eq!(outcome.count(Category::InvalidCallArgument), 1, "{}", render(&outcome));
    assert_eq!(outcome.count(Category::Interference), 0);
}

#[test]
fn test_inferred_operand_summaries_interfere() {
    let mut b = ProgramBuilder::new();
    b.regions(&["Left"]);
    let a = b.var("a", Type::Scalar, vec![arg(&["Left"])]);
    b.push(a);
    let writer_body = block(vec![b.stmt(assign(name("a"), lit()))]);
    let writer = b.function("writer", vec![], vec![], Some(writer_body));
    let reader_body = block(vec![b.stmt(binary(name("a"), lit()))]);
    let reader = b.function("reader", vec![], vec![], Some(reader_body));
    b.push(writer);
    b.push(reader);
    let body = block(vec![b.stmt(invoke(vec![name("writer"), name("reader")]))]);
    let main = b.function("main", vec![], vec![], Some(body));
    b.push(main);

    let outcome = run(&b.build(), DefaultScheme::Inference);
    assert_eq!(outcome.count(Category::Interference), 1, "{}", render(&outcome));
    assert_eq!(outcome.summaries["main"].to_string(), "writes(Left)");
}

fn captured_locals(first: &str, second: &str) -> Program {
    let mut b = ProgramBuilder::new();
    let x = b.local("x", Type::Scalar, vec![], None);
    let y = b.local("y", Type::Scalar, vec![], None);
    let fork = b.stmt(invoke(vec![
        lambda(vec![expr_stmt(assign(name(first), lit()))]),
        lambda(vec![expr_stmt(assign(name(second), lit()))]),
    ]));
    let main = b.function("main", vec![], vec![], Some(block(vec![x, y, fork])));
    b.push(main);
    b.build()
}

#[test]
fn test_closures_writing_distinct_captured_locals() {
    let outcome = run(&captured_locals("x", "y"), DefaultScheme::Global);
    assert!(outcome.diagnostics.is_empty(), "{}", render(&outcome));
}

#[test]
fn test_closures_writing_same_captured_local() {
    let outcome = run(&captured_locals("x", "x"), DefaultScheme::Global);
    let conflicts = only(&outcome, Category::Interference);
    assert_eq!(conflicts.len(), 1, "{}", render(&outcome));
    assert_eq!(payload_effects(&conflicts[0].payload), vec!["writes(Local:x)", "writes(Local:x)"]);
    assert_eq!(outcome.diagnostics.len(), 1);
}
