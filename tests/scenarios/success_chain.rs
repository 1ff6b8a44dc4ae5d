//! Test: Success Chain - each step's result feeds the next

use crate::helpers::*;
use atom_pipeline::{AtomType, ExecutionContext, ExecutionStatus};
use serde_json::json;

/// Test the load | filter | sum chain over yearly amounts
#[test]
fn test_yearly_amount_chain() {
    let dsl = r#"data.load("sales.csv") | transform.filter(year=2024) | metrics.sum("amount")"#;
    let pipeline = atom_pipeline::parse(dsl).unwrap();
    assert_eq!(pipeline.name, "anonymous");
    assert_eq!(pipeline.steps.len(), 3);

    let mut registry = TestRegistry::new();
    registry.registry.register(AtomType::Data, "load", |_, _| {
        Ok(Some(json!([
            {"amount": 10, "year": 2024},
            {"amount": 5, "year": 2023}
        ])))
    });
    let run = run_with(registry, &pipeline, ExecutionContext::new(), Vec::new());

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!(10));
    assert!(run.ctx.errors.is_empty());
}

/// Test a declared threshold resolves without a caller-supplied binding
#[test]
fn test_declared_threshold_filters_input() {
    let ctx = ExecutionContext::new().with_data(json!([
        {"id": 1, "amount": 100},
        {"id": 2, "amount": 50},
        {"id": 3, "amount": 100.0}
    ]));
    assert!(ctx.get_var("threshold").is_none());

    let run = run_with(
        TestRegistry::new(),
        "$threshold = 100\ndata.from_input() | transform.filter(amount=$threshold)",
        ctx,
        Vec::new(),
    );

    assert_completed(&run);
    assert_eq!(
        run.ctx.data,
        json!([{"id": 1, "amount": 100}, {"id": 3, "amount": 100.0}])
    );
    assert_eq!(run.ctx.get_var("threshold"), Some(&json!(100)));
    assert!(run.ctx.errors.is_empty());
}

/// Test the canonical load | filter | aggregate flow
#[test]
fn test_filter_then_sum() {
    let run = run_dsl(
        r#"data.load("sales") | transform.filter(status="active") | metrics.sum("amount")"#,
    );

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!(400));
    assert_eq!(run.ctx.step_count, 3);
    assert_eq!(run.status(), ExecutionStatus::Completed);
    assert_call_order(&run, &["data.load"]);
}

/// Test that steps run strictly in written order
#[test]
fn test_sort_limit_select() {
    let run = run_dsl(
        r#"@pipeline top_sales:
  data.load()
  | transform.sort(by="amount", order="desc")
  | transform.limit(2)
  | transform.select(fields=["id", "amount"])"#,
    );

    assert_completed(&run);
    assert_eq!(
        run.ctx.data,
        json!([{"id": 4, "amount": 200}, {"id": 1, "amount": 120}])
    );
}

/// Test that a handler returning nothing leaves data untouched
#[test]
fn test_capture_keeps_data() {
    let run = run_dsl(r#"data.load() | metrics.count() | report.capture(format="pdf") | report.capture()"#);

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!(4));
    assert_call_order(&run, &["data.load", "report.capture", "report.capture"]);
    assert_eq!(run.calls[1], r#"report.capture {"format":"pdf"}"#);
}

/// Test numeric operators and membership in filter
#[test]
fn test_filter_operators_and_calculate() {
    let run = run_dsl(
        r#"data.load()
  | transform.filter(amount__gte=80, region__in=["EU", "US"])
  | metrics.calculate(["sum", "count", "max"], field="amount")"#,
    );

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!({"sum": 200, "count": 2, "max": 120}));
}

/// Test an empty pipeline does nothing
#[test]
fn test_empty_pipeline() {
    let run = run_dsl("");

    assert_completed(&run);
    assert_eq!(run.ctx.step_count, 0);
    assert!(run.calls.is_empty());
}
