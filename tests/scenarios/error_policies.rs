//! Test: Error Policies - stop, skip and retry

use crate::helpers::*;
use atom_pipeline::{ErrorKind, ErrorPolicy, ExecutionContext, ExecutionStatus};
use serde_json::json;

/// Test that a failing step halts the pipeline by default
#[test]
fn test_stop_halts_pipeline() {
    let run = run_dsl("data.load() | alert.fail(channel=\"ops\") | metrics.count()");

    assert_failed(&run);
    assert_call_order(&run, &["data.load", "alert.fail"]);
    assert_eq!(run.ctx.data, sales_rows());
    assert_eq!(run.ctx.step_count, 2);
    assert_eq!(run.error_steps(), vec![r#"alert.fail(channel="ops")"#]);
    assert_eq!(run.ctx.errors[0].kind, ErrorKind::Handler);
    assert!(run.ctx.errors[0].message.contains("alert channel unavailable"));
}

/// Test that a skipped failure is recorded and execution continues
#[test]
fn test_skip_continues_with_previous_data() {
    let pipeline = with_policy("data.load() | alert.fail() | metrics.count()", 1, ErrorPolicy::Skip);
    let run = run_with(TestRegistry::new(), &pipeline, ExecutionContext::new(), Vec::new());

    assert_completed(&run);
    assert_eq!(run.status(), ExecutionStatus::CompletedWithErrors);
    assert_eq!(run.ctx.data, json!(4));
    assert_eq!(run.ctx.errors.len(), 1);
    assert_eq!(run.ctx.errors[0].step_index, 2);
}

/// Test that a retry which succeeds leaves exactly one error record
#[test]
fn test_retry_recovers() {
    let pipeline = with_policy("data.load() | alert.flaky(channel=\"ops\")", 1, ErrorPolicy::Retry);
    let run = run_with(
        TestRegistry::with_flaky_failures(1),
        &pipeline,
        ExecutionContext::new(),
        Vec::new(),
    );

    assert_completed(&run);
    assert_call_order(&run, &["data.load", "alert.flaky", "alert.flaky"]);
    assert_eq!(run.ctx.data, json!("recovered"));
    assert_eq!(run.ctx.errors.len(), 1);
    assert_eq!(run.ctx.step_count, 2);
}

/// Test that a retry is attempted only once
#[test]
fn test_retry_fails_twice() {
    let pipeline = with_policy("alert.flaky() | metrics.count()", 0, ErrorPolicy::Retry);
    let run = run_with(
        TestRegistry::with_flaky_failures(5),
        &pipeline,
        ExecutionContext::new(),
        Vec::new(),
    );

    assert_failed(&run);
    assert_call_order(&run, &["alert.flaky", "alert.flaky"]);
    assert_eq!(run.ctx.errors.len(), 2);
    assert_eq!(run.error_steps(), vec!["alert.flaky()", "alert.flaky()"]);
}

/// Test that an unresolvable parameter is subject to the step's policy
#[test]
fn test_skip_undefined_variable() {
    let pipeline = with_policy(
        "data.load() | report.capture(to=$recipient) | metrics.count()",
        1,
        ErrorPolicy::Skip,
    );
    let run = run_with(TestRegistry::new(), &pipeline, ExecutionContext::new(), Vec::new());

    assert_completed(&run);
    assert_call_order(&run, &["data.load"]);
    assert_eq!(run.ctx.errors[0].kind, ErrorKind::UndefinedVariable);
    assert_eq!(run.ctx.data, json!(4));
}

/// Test that handler errors surface as error-level context logs
#[test]
fn test_failure_is_logged() {
    let run = run_dsl("alert.fail()");

    assert_failed(&run);
    assert!(run
        .ctx
        .logs
        .iter()
        .any(|entry| entry.message.starts_with("ERROR: alert.fail() failed")));
}
