//! Test: Variable Substitution - $name and ${name} in parameters

use crate::helpers::*;
use atom_pipeline::{DslError, ExecutionContext};
use serde_json::json;

fn context_with(vars: &[(&str, serde_json::Value)]) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    for (name, value) in vars {
        ctx.set_var(*name, value.clone());
    }
    ctx
}

/// Test declared variables feed step parameters
#[test]
fn test_declared_variable() {
    let run = run_dsl(
        "$threshold = 100\ndata.load() | transform.filter(amount__gt=$threshold) | metrics.count()",
    );

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!(2));
}

/// Test caller-supplied variables
#[test]
fn test_context_variable() {
    let run = run_with(
        TestRegistry::new(),
        "data.load() | transform.filter(region=$region) | metrics.sum(\"amount\")",
        context_with(&[("region", json!("EU"))]),
        Vec::new(),
    );

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!(160));
}

/// Test that declared variables win over caller-supplied ones
#[test]
fn test_declared_overrides_context() {
    let run = run_with(
        TestRegistry::new(),
        "$threshold = 100\ndata.load() | transform.filter(amount__gt=$threshold) | metrics.count()",
        context_with(&[("threshold", json!(0))]),
        Vec::new(),
    );

    assert_completed(&run);
    assert_eq!(run.ctx.data, json!(2));
    assert_eq!(run.ctx.get_var("threshold"), Some(&json!(100)));
}

/// Test exact references keep their type and embedded ones interpolate
#[test]
fn test_reference_forms() {
    let run = run_with(
        TestRegistry::new(),
        r#"report.capture(limit=$n, title="Top ${n} for ${region}", regions=[$region, "US"])"#,
        context_with(&[("n", json!(5)), ("region", json!("EU"))]),
        Vec::new(),
    );

    assert_completed(&run);
    assert_eq!(
        run.calls[0],
        r#"report.capture {"limit":5,"title":"Top 5 for EU","regions":["EU","US"]}"#
    );
}

/// Test an unbound reference stops the pipeline before the handler runs
#[test]
fn test_undefined_variable_stops() {
    let run = run_dsl("data.load() | report.capture(to=$recipient) | metrics.count()");

    assert_failed(&run);
    assert_eq!(
        run.result,
        Err(DslError::UndefinedVariable("$recipient".to_string()))
    );
    assert_call_order(&run, &["data.load"]);
}
