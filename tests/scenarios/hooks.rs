//! Test: Hooks - lifecycle callbacks around steps and pipelines

use crate::helpers::*;
use atom_pipeline::{
    ErrorPolicy, EventHook, ExecutionContext, ExecutionEvent, ExecutionStatus, LoggingHook,
};
use std::sync::{Arc, Mutex};

fn recording_hook() -> (EventHook, Arc<Mutex<Vec<ExecutionEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let hook = EventHook::new(move |event| sink.lock().unwrap().push(event));
    (hook, events)
}

fn event_names(events: &[ExecutionEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            ExecutionEvent::PipelineStarted { .. } => "pipeline_started",
            ExecutionEvent::StepStarted { .. } => "step_started",
            ExecutionEvent::StepCompleted { .. } => "step_completed",
            ExecutionEvent::StepFailed { .. } => "step_failed",
            ExecutionEvent::StepRetrying { .. } => "step_retrying",
            ExecutionEvent::PipelineCompleted { .. } => "pipeline_completed",
        })
        .collect()
}

/// Test event order for a successful run
#[test]
fn test_events_for_success() {
    let (hook, events) = recording_hook();
    let run = run_with(
        TestRegistry::new(),
        "data.load() | report.capture()",
        ExecutionContext::new(),
        vec![Box::new(hook)],
    );

    assert_completed(&run);
    let events = events.lock().unwrap();
    assert_eq!(
        event_names(&events),
        vec![
            "pipeline_started",
            "step_started",
            "step_completed",
            "step_started",
            "step_completed",
            "pipeline_completed"
        ]
    );
    assert!(matches!(
        events[4],
        ExecutionEvent::StepCompleted { index: 1, data_replaced: false, .. }
    ));
}

/// Test that the pipeline-completed event fires even when a step fails
#[test]
fn test_events_for_retry_then_failure() {
    let (hook, events) = recording_hook();
    let pipeline = with_policy("alert.flaky()", 0, ErrorPolicy::Retry);
    let run = run_with(
        TestRegistry::with_flaky_failures(2),
        &pipeline,
        ExecutionContext::new(),
        vec![Box::new(hook)],
    );

    assert_failed(&run);
    let events = events.lock().unwrap();
    assert_eq!(
        event_names(&events),
        vec![
            "pipeline_started",
            "step_started",
            "step_failed",
            "step_retrying",
            "step_failed",
            "pipeline_completed"
        ]
    );
    assert!(matches!(
        events[5],
        ExecutionEvent::PipelineCompleted { status: ExecutionStatus::Failed, .. }
    ));
}

/// Test the context log written by the logging hook
#[test]
fn test_logging_hook_lines() {
    let run = run_with(
        TestRegistry::new(),
        "@pipeline nightly:\n  data.load() | report.capture()",
        ExecutionContext::new(),
        vec![Box::new(LoggingHook)],
    );

    assert_completed(&run);
    let messages: Vec<&str> = run.ctx.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages[0], "Starting pipeline: nightly");
    assert_eq!(messages[1], "Executing: data.load()");
    assert_eq!(messages[2], "Executing: report.capture()");
    assert_eq!(messages[3], "captured");
    assert!(messages[4].starts_with("Pipeline completed in"));
}
