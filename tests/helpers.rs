//! Test utility functions for atom-pipeline scenarios

use async_trait::async_trait;
use atom_pipeline::{
    AsyncAtomHandler, AtomContext, AtomError, AtomRegistry, AtomResult, AtomType, DslError,
    ExecutionContext, ExecutionHook, ExecutionStatus, Executor, Params,
};
use atom_pipeline::execution::PipelineSource;
use atom_pipeline::{ErrorPolicy, PipelineDefinition};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared record of handler invocations, `"type.action <params json>"`
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn sales_rows() -> Value {
    json!([
        {"id": 1, "region": "EU", "amount": 120, "status": "active"},
        {"id": 2, "region": "US", "amount": 80, "status": "active"},
        {"id": 3, "region": "EU", "amount": 40, "status": "closed"},
        {"id": 4, "region": "APAC", "amount": 200, "status": "active"}
    ])
}

fn record(calls: &CallLog, name: &str, params: &Params) {
    let entry = format!("{} {}", name, Value::Object(params.clone()));
    calls.lock().unwrap().push(entry);
}

/// Built-in atoms plus recording test atoms:
///
/// - `data.load(...)`: sales rows, or the `rows` parameter when given
/// - `report.capture(...)`: records params, leaves data alone
/// - `alert.fail(...)`: always fails
/// - `alert.flaky(...)`: fails for the first `failures` calls, then returns `"recovered"`
/// - `source.fetch(...)`: async, returns sales rows after a short sleep
pub struct TestRegistry {
    pub registry: AtomRegistry,
    pub calls: CallLog,
    flaky_calls: Arc<AtomicUsize>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::with_flaky_failures(0)
    }

    pub fn with_flaky_failures(failures: usize) -> Self {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let flaky_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = AtomRegistry::with_builtins();

        let log = calls.clone();
        registry.register(AtomType::Data, "load", move |_, params| {
            record(&log, "data.load", params);
            Ok(Some(params.get("rows").cloned().unwrap_or_else(sales_rows)))
        });

        let log = calls.clone();
        registry.register(AtomType::Report, "capture", move |ctx, params| {
            record(&log, "report.capture", params);
            ctx.log("captured", atom_pipeline::LogLevel::Info);
            Ok(None)
        });

        let log = calls.clone();
        registry.register(AtomType::Alert, "fail", move |_, params| {
            record(&log, "alert.fail", params);
            Err(AtomError::new("alert channel unavailable"))
        });

        let log = calls.clone();
        let counter = flaky_calls.clone();
        registry.register(AtomType::Alert, "flaky", move |_, params| {
            record(&log, "alert.flaky", params);
            if counter.fetch_add(1, Ordering::SeqCst) < failures {
                Err(AtomError::new("transient failure"))
            } else {
                Ok(Some(json!("recovered")))
            }
        });

        registry.register_async(
            AtomType::Source,
            "fetch",
            SlowSource {
                calls: calls.clone(),
                delay: Duration::from_millis(5),
            },
        );

        Self {
            registry,
            calls,
            flaky_calls,
        }
    }

    pub fn executor(self) -> (Executor, CallLog, Arc<AtomicUsize>) {
        let calls = self.calls.clone();
        let flaky = self.flaky_calls.clone();
        (Executor::new(Arc::new(self.registry)), calls, flaky)
    }
}

/// Async handler simulating a remote data source
pub struct SlowSource {
    calls: CallLog,
    delay: Duration,
}

#[async_trait]
impl AsyncAtomHandler for SlowSource {
    async fn call(&self, ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
        tokio::time::sleep(self.delay).await;
        record(&self.calls, "source.fetch", params);
        ctx.set_metadata("fetched_from", json!("remote"));
        Ok(Some(sales_rows()))
    }
}

/// Outcome of one run plus everything it left behind
pub struct PipelineRun {
    pub ctx: ExecutionContext,
    pub result: Result<(), DslError>,
    pub calls: Vec<String>,
}

impl PipelineRun {
    pub fn status(&self) -> ExecutionStatus {
        ExecutionStatus::from_outcome(&self.result, &self.ctx)
    }

    /// `type.action` of each invocation, in order
    pub fn call_order(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn error_steps(&self) -> Vec<&str> {
        self.ctx.errors.iter().map(|e| e.step.as_str()).collect()
    }
}

/// Run `dsl` synchronously against a fresh registry and context
pub fn run_dsl(dsl: &str) -> PipelineRun {
    run_with(TestRegistry::new(), dsl, ExecutionContext::new(), Vec::new())
}

pub fn run_with<'a>(
    registry: TestRegistry,
    source: impl Into<PipelineSource<'a>>,
    mut ctx: ExecutionContext,
    hooks: Vec<Box<dyn ExecutionHook>>,
) -> PipelineRun {
    let (mut executor, calls, _) = registry.executor();
    for hook in hooks {
        executor.add_hook(hook);
    }
    let result = executor.execute(source, &mut ctx);
    let calls = calls.lock().unwrap().clone();
    PipelineRun { ctx, result, calls }
}

/// Parse `dsl` and set the error policy of the step at `index`
pub fn with_policy(dsl: &str, index: usize, policy: ErrorPolicy) -> PipelineDefinition {
    let mut pipeline = atom_pipeline::parse(dsl).unwrap();
    pipeline.steps[index].on_error = policy;
    pipeline
}

pub fn assert_completed(run: &PipelineRun) {
    assert!(
        run.result.is_ok(),
        "expected pipeline to complete, got {:?}",
        run.result
    );
}

pub fn assert_failed(run: &PipelineRun) {
    assert!(run.result.is_err(), "expected pipeline to fail");
    assert_eq!(run.status(), ExecutionStatus::Failed);
}

pub fn assert_call_order(run: &PipelineRun, expected: &[&str]) {
    assert_eq!(
        run.call_order(),
        expected,
        "unexpected invocation order: {:?}",
        run.calls
    );
}
