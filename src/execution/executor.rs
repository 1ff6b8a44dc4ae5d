//! Pipeline executor - runs steps in order against one execution context

use crate::core::{
    atom::Params,
    context::ExecutionContext,
    error::DslError,
    pipeline::PipelineDefinition,
    step::{ErrorPolicy, PipelineStep},
};
use crate::dsl::parser::{Parser, ParserConfig};
use crate::execution::hooks::ExecutionHook;
use crate::registry::{AtomRegistry, Handler, RegisteredAtom};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to execute: DSL text (parsed first) or an already-built definition
#[derive(Debug, Clone, Copy)]
pub enum PipelineSource<'a> {
    Text(&'a str),
    Definition(&'a PipelineDefinition),
}

impl<'a> From<&'a str> for PipelineSource<'a> {
    fn from(text: &'a str) -> Self {
        PipelineSource::Text(text)
    }
}

impl<'a> From<&'a String> for PipelineSource<'a> {
    fn from(text: &'a String) -> Self {
        PipelineSource::Text(text)
    }
}

impl<'a> From<&'a PipelineDefinition> for PipelineSource<'a> {
    fn from(definition: &'a PipelineDefinition) -> Self {
        PipelineSource::Definition(definition)
    }
}

/// How a single handler attempt ended, after applying the step's policy
#[derive(Debug)]
enum StepOutcome {
    Success(Option<Value>),
    Skip(DslError),
    Retry(DslError),
    Fatal(DslError),
}

impl StepOutcome {
    fn classify(policy: ErrorPolicy, result: Result<Option<Value>, DslError>) -> Self {
        match result {
            Ok(value) => StepOutcome::Success(value),
            Err(e) if !e.is_recoverable() => StepOutcome::Fatal(e),
            Err(e) => match policy {
                ErrorPolicy::Stop => StepOutcome::Fatal(e),
                ErrorPolicy::Skip => StepOutcome::Skip(e),
                ErrorPolicy::Retry => StepOutcome::Retry(e),
            },
        }
    }
}

/// Runs pipeline definitions against an [`ExecutionContext`]
///
/// The context is borrowed mutably for the whole run. On a propagated failure
/// it still holds the data, logs and error records accumulated so far.
pub struct Executor {
    registry: Arc<AtomRegistry>,
    hooks: Vec<Box<dyn ExecutionHook>>,
    parser: Parser,
}

impl Executor {
    pub fn new(registry: Arc<AtomRegistry>) -> Self {
        Self {
            registry,
            hooks: Vec::new(),
            parser: Parser::new(),
        }
    }

    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser = Parser::with_config(config);
        self
    }

    pub fn with_hook<H: ExecutionHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn add_hook(&mut self, hook: Box<dyn ExecutionHook>) {
        self.hooks.push(hook);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn registry(&self) -> &Arc<AtomRegistry> {
        &self.registry
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Execute synchronously; steps with async-only handlers fail with
    /// [`DslError::AsyncOnly`]
    pub fn execute<'a>(
        &self,
        source: impl Into<PipelineSource<'a>>,
        ctx: &mut ExecutionContext,
    ) -> Result<(), DslError> {
        let pipeline = self.load(source.into())?;
        self.begin(&pipeline, ctx);

        let result = self.run_steps(&pipeline, ctx);

        self.finish(&pipeline, ctx, &result);
        result
    }

    /// Execute, awaiting async handlers; ordering and error policy match [`Executor::execute`]
    pub async fn execute_async<'a>(
        &self,
        source: impl Into<PipelineSource<'a>>,
        ctx: &mut ExecutionContext,
    ) -> Result<(), DslError> {
        let pipeline = self.load(source.into())?;
        self.begin(&pipeline, ctx);

        let result = self.run_steps_async(&pipeline, ctx).await;

        self.finish(&pipeline, ctx, &result);
        result
    }

    fn load<'a>(&self, source: PipelineSource<'a>) -> Result<Cow<'a, PipelineDefinition>, DslError> {
        match source {
            PipelineSource::Text(text) => Ok(Cow::Owned(self.parser.parse(text)?)),
            PipelineSource::Definition(definition) => Ok(Cow::Borrowed(definition)),
        }
    }

    fn begin(&self, pipeline: &PipelineDefinition, ctx: &mut ExecutionContext) {
        // Declared variables take precedence over caller-supplied ones
        for (name, value) in &pipeline.variables {
            ctx.set_var(name.clone(), value.clone());
        }
        if ctx.domain.is_none() {
            ctx.domain = pipeline.domain.clone();
        }

        debug!(
            "Executing pipeline '{}' ({} steps) as {}",
            pipeline.name,
            pipeline.steps.len(),
            ctx.execution_id
        );
        for hook in &self.hooks {
            hook.before_pipeline(pipeline, ctx);
        }
    }

    fn finish(
        &self,
        pipeline: &PipelineDefinition,
        ctx: &mut ExecutionContext,
        result: &Result<(), DslError>,
    ) {
        for hook in &self.hooks {
            hook.after_pipeline(pipeline, ctx, result);
        }
    }

    fn run_steps(
        &self,
        pipeline: &PipelineDefinition,
        ctx: &mut ExecutionContext,
    ) -> Result<(), DslError> {
        for (index, step) in pipeline.steps.iter().enumerate() {
            let atom = self.prepare_step(step, index, ctx)?;
            let mut params = None;

            let first = self.attempt(atom, step, ctx, &mut params);
            match StepOutcome::classify(step.on_error, first) {
                StepOutcome::Success(value) => self.complete_step(step, index, value, ctx),
                StepOutcome::Skip(e) => self.skip_step(step, index, e, ctx),
                StepOutcome::Fatal(e) => return Err(self.fail_step(step, index, e, ctx)),
                StepOutcome::Retry(e) => {
                    self.record_failure(step, index, &e, ctx);
                    self.notify_retry(step, index, ctx);
                    match self.attempt(atom, step, ctx, &mut params) {
                        Ok(value) => self.complete_step(step, index, value, ctx),
                        Err(e) => return Err(self.fail_step(step, index, e, ctx)),
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_steps_async(
        &self,
        pipeline: &PipelineDefinition,
        ctx: &mut ExecutionContext,
    ) -> Result<(), DslError> {
        for (index, step) in pipeline.steps.iter().enumerate() {
            let atom = self.prepare_step(step, index, ctx)?;
            let mut params = None;

            let first = self.attempt_async(atom, step, ctx, &mut params).await;
            match StepOutcome::classify(step.on_error, first) {
                StepOutcome::Success(value) => self.complete_step(step, index, value, ctx),
                StepOutcome::Skip(e) => self.skip_step(step, index, e, ctx),
                StepOutcome::Fatal(e) => return Err(self.fail_step(step, index, e, ctx)),
                StepOutcome::Retry(e) => {
                    self.record_failure(step, index, &e, ctx);
                    self.notify_retry(step, index, ctx);
                    match self.attempt_async(atom, step, ctx, &mut params).await {
                        Ok(value) => self.complete_step(step, index, value, ctx),
                        Err(e) => return Err(self.fail_step(step, index, e, ctx)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Count the step, run `before_step` hooks and look up its atom.
    ///
    /// Lookup happens before parameter resolution so an unknown atom fails
    /// regardless of the step's policy.
    fn prepare_step(
        &self,
        step: &PipelineStep,
        index: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<&RegisteredAtom, DslError> {
        ctx.increment_step();
        for hook in &self.hooks {
            hook.before_step(step, index, ctx);
        }

        match self.registry.lookup(step.atom.atom_type, &step.atom.action) {
            Some(atom) => Ok(atom),
            None => {
                let err = DslError::UnknownAtom {
                    atom_type: step.atom.atom_type.to_string(),
                    action: step.atom.action.clone(),
                };
                Err(self.fail_step(step, index, err, ctx))
            }
        }
    }

    /// Resolve and normalize parameters once per step, then invoke the handler.
    ///
    /// A retry reuses the parameters prepared by the first attempt.
    fn attempt(
        &self,
        atom: &RegisteredAtom,
        step: &PipelineStep,
        ctx: &mut ExecutionContext,
        params: &mut Option<Params>,
    ) -> Result<Option<Value>, DslError> {
        let resolved = resolve_once(atom, step, ctx, params)?;
        match &atom.handler {
            Handler::Sync(f) => f(ctx, resolved).map_err(|e| handler_error(step, e.0)),
            Handler::Async(_) => Err(DslError::AsyncOnly(step.atom.qualified_name())),
        }
    }

    async fn attempt_async(
        &self,
        atom: &RegisteredAtom,
        step: &PipelineStep,
        ctx: &mut ExecutionContext,
        params: &mut Option<Params>,
    ) -> Result<Option<Value>, DslError> {
        let resolved = resolve_once(atom, step, ctx, params)?;
        match &atom.handler {
            Handler::Sync(f) => f(ctx, resolved).map_err(|e| handler_error(step, e.0)),
            Handler::Async(h) => h
                .call(ctx, resolved)
                .await
                .map_err(|e| handler_error(step, e.0)),
        }
    }

    fn complete_step(
        &self,
        step: &PipelineStep,
        index: usize,
        value: Option<Value>,
        ctx: &mut ExecutionContext,
    ) {
        // A null result leaves the data as it was
        let value = value.filter(|v| !v.is_null());
        if let Some(data) = &value {
            ctx.data = data.clone();
        }
        for hook in &self.hooks {
            hook.after_step(step, index, value.as_ref(), ctx);
        }
    }

    fn skip_step(&self, step: &PipelineStep, index: usize, err: DslError, ctx: &mut ExecutionContext) {
        self.record_failure(step, index, &err, ctx);
        warn!(
            "Skipping failed step {} ({}): {}",
            index + 1,
            step.atom.qualified_name(),
            err
        );
    }

    /// Record a failure that propagates, handing the error back to the caller
    fn fail_step(
        &self,
        step: &PipelineStep,
        index: usize,
        err: DslError,
        ctx: &mut ExecutionContext,
    ) -> DslError {
        self.record_failure(step, index, &err, ctx);
        debug!(
            "Stopping at step {} ({}): {}",
            index + 1,
            step.atom.qualified_name(),
            err
        );
        err
    }

    fn record_failure(
        &self,
        step: &PipelineStep,
        index: usize,
        err: &DslError,
        ctx: &mut ExecutionContext,
    ) {
        for hook in &self.hooks {
            hook.on_error(step, index, err, ctx);
        }
        ctx.record_failure(err, &step.identifier());
    }

    fn notify_retry(&self, step: &PipelineStep, index: usize, ctx: &mut ExecutionContext) {
        debug!("Retrying step {} ({})", index + 1, step.atom.qualified_name());
        for hook in &self.hooks {
            hook.on_retry(step, index, ctx);
        }
    }
}

/// Variable substitution, then binding against the atom's declared parameters.
/// A declaration mismatch fails like the handler itself would.
fn resolve_once<'p>(
    atom: &RegisteredAtom,
    step: &PipelineStep,
    ctx: &ExecutionContext,
    params: &'p mut Option<Params>,
) -> Result<&'p Params, DslError> {
    let prepared = match params.take() {
        Some(prepared) => prepared,
        None => {
            let resolved = ctx.resolve_params(&step.atom.params)?;
            atom.info
                .normalize(&resolved)
                .map_err(|e| handler_error(step, e.0))?
        }
    };
    Ok(params.insert(prepared))
}

fn handler_error(step: &PipelineStep, message: String) -> DslError {
    DslError::Handler {
        atom: step.identifier(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::AtomType;
    use crate::core::error::{AtomError, ErrorKind};
    use crate::execution::hooks::LoggingHook;
    use crate::registry::{AtomInfo, ParamSpec, ParamType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> AtomRegistry {
        let mut registry = AtomRegistry::new();
        registry
            .register(AtomType::Data, "load", |_, params| {
                Ok(params.get("_arg0").cloned().or(Some(json!([1, 2, 3]))))
            })
            .register(AtomType::Metrics, "count", |ctx, _| {
                Ok(Some(json!(ctx.data().as_array().map(Vec::len).unwrap_or(0))))
            })
            .register(AtomType::Transform, "fail", |_, _| Err(AtomError::new("boom")))
            .register(AtomType::Transform, "noop", |_, _| Ok(None))
            .register(AtomType::Transform, "null", |_, _| Ok(Some(Value::Null)));
        registry
    }

    fn executor() -> Executor {
        Executor::new(Arc::new(registry()))
    }

    #[test]
    fn test_result_replaces_data() {
        let mut ctx = ExecutionContext::new();
        executor()
            .execute("data.load() | metrics.count()", &mut ctx)
            .unwrap();
        assert_eq!(ctx.data, json!(3));
        assert_eq!(ctx.step_count, 2);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_none_and_null_results_keep_data() {
        let mut ctx = ExecutionContext::new();
        executor()
            .execute("data.load() | transform.noop() | transform.null()", &mut ctx)
            .unwrap();
        assert_eq!(ctx.data, json!([1, 2, 3]));
    }

    #[test]
    fn test_stop_is_default() {
        let mut ctx = ExecutionContext::new();
        let err = executor()
            .execute("data.load() | transform.fail() | metrics.count()", &mut ctx)
            .unwrap_err();

        assert!(matches!(err, DslError::Handler { .. }));
        assert_eq!(ctx.data, json!([1, 2, 3]));
        assert_eq!(ctx.step_count, 2);
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].kind, ErrorKind::Handler);
        assert_eq!(ctx.errors[0].step, "transform.fail()");
        assert_eq!(ctx.errors[0].step_index, 2);
    }

    #[test]
    fn test_skip_continues() {
        let mut pipeline = crate::dsl::parse("data.load() | transform.fail() | metrics.count()").unwrap();
        pipeline.steps[1].on_error = ErrorPolicy::Skip;

        let mut ctx = ExecutionContext::new();
        executor().execute(&pipeline, &mut ctx).unwrap();
        assert_eq!(ctx.data, json!(3));
        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn test_retry_failing_twice_records_two_errors() {
        let mut pipeline = crate::dsl::parse("data.load() | transform.fail()").unwrap();
        pipeline.steps[1].on_error = ErrorPolicy::Retry;

        let mut ctx = ExecutionContext::new();
        assert!(executor().execute(&pipeline, &mut ctx).is_err());
        assert_eq!(ctx.errors.len(), 2);
    }

    #[test]
    fn test_retry_reuses_resolved_params() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut registry = registry();
        registry.register(AtomType::Transform, "flaky", move |ctx, params| {
            // Changing the variable must not affect the retried call's params
            ctx.set_variable("x", json!("changed"));
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AtomError::new("first call fails"))
            } else {
                Ok(params.get("v").cloned())
            }
        });
        let mut pipeline = crate::dsl::parse("transform.flaky(v=$x)").unwrap();
        pipeline.steps[0].on_error = ErrorPolicy::Retry;

        let mut ctx = ExecutionContext::new();
        ctx.set_var("x", json!("original"));
        Executor::new(Arc::new(registry))
            .execute(&pipeline, &mut ctx)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.data, json!("original"));
        assert_eq!(ctx.errors.len(), 1);
    }

    fn registry_with_declared_params() -> AtomRegistry {
        let mut registry = registry();
        registry.register_with_info(
            AtomType::Export,
            "save",
            AtomInfo::new("Save data")
                .with_param(ParamSpec::required("path", ParamType::String))
                .with_param(ParamSpec::optional("format", ParamType::String, json!("csv"))),
            |_, params| Ok(Some(Value::Object(params.clone()))),
        );
        registry
    }

    #[test]
    fn test_declared_params_are_bound_before_the_call() {
        let mut ctx = ExecutionContext::new();
        ctx.set_var("dir", json!("out"));
        Executor::new(Arc::new(registry_with_declared_params()))
            .execute(r#"export.save("${dir}/sales.csv")"#, &mut ctx)
            .unwrap();
        assert_eq!(ctx.data, json!({"path": "out/sales.csv", "format": "csv"}));
    }

    #[test]
    fn test_declared_param_mismatch_follows_policy() {
        let executor = Executor::new(Arc::new(registry_with_declared_params()));

        let mut ctx = ExecutionContext::new();
        let err = executor.execute("data.load() | export.save(format=\"json\")", &mut ctx).unwrap_err();
        assert!(err.to_string().contains("required parameter 'path' is missing"));
        assert_eq!(ctx.errors[0].kind, ErrorKind::Handler);

        let mut pipeline = crate::dsl::parse("data.load() | export.save(path=3) | metrics.count()").unwrap();
        pipeline.steps[1].on_error = ErrorPolicy::Skip;
        let mut ctx = ExecutionContext::new();
        executor.execute(&pipeline, &mut ctx).unwrap();
        assert_eq!(ctx.data, json!(3));
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].message.contains("must be string"));
    }

    #[test]
    fn test_unknown_atom_ignores_policy() {
        let mut pipeline = crate::dsl::parse("data.load() | report.missing()").unwrap();
        pipeline.steps[1].on_error = ErrorPolicy::Skip;

        let mut ctx = ExecutionContext::new();
        let err = executor().execute(&pipeline, &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "Unknown atom: report.missing");
        assert_eq!(ctx.errors[0].kind, ErrorKind::UnknownAtom);
    }

    #[test]
    fn test_parse_error_propagates_without_running() {
        let mut ctx = ExecutionContext::new();
        let executor = executor().with_hook(LoggingHook);
        let err = executor.execute("data.load(", &mut ctx).unwrap_err();
        assert!(matches!(err, DslError::Syntax { .. }));
        assert_eq!(ctx.step_count, 0);
        assert!(ctx.logs.is_empty());
    }

    #[test]
    fn test_pipeline_variables_override_context() {
        let mut ctx = ExecutionContext::new();
        ctx.set_var("src", json!("from caller"));
        executor()
            .execute("$src = \"declared\"\ndata.load($src)", &mut ctx)
            .unwrap();
        assert_eq!(ctx.data, json!("declared"));
        assert_eq!(ctx.get_var("src"), Some(&json!("declared")));
    }

    #[test]
    fn test_logging_hook_runs_after_failure() {
        let mut ctx = ExecutionContext::new();
        let executor = executor().with_hook(LoggingHook);
        let _ = executor.execute("transform.fail()", &mut ctx);

        let last = ctx.logs.last().unwrap();
        assert!(last.message.starts_with("Pipeline completed in"));
        assert!(ctx
            .logs
            .iter()
            .any(|l| l.message == "Error in transform.fail(): transform.fail() failed: boom"));
    }

    #[test]
    fn test_async_only_handler_in_sync_executor() {
        struct Remote;

        #[async_trait::async_trait]
        impl crate::registry::AsyncAtomHandler for Remote {
            async fn call(
                &self,
                _ctx: &mut dyn crate::core::context::AtomContext,
                _params: &Params,
            ) -> crate::registry::AtomResult {
                Ok(Some(json!("remote")))
            }
        }

        let mut registry = registry();
        registry.register_async(AtomType::Source, "fetch", Remote);
        let executor = Executor::new(Arc::new(registry));

        let mut ctx = ExecutionContext::new();
        let err = executor.execute("source.fetch()", &mut ctx).unwrap_err();
        assert_eq!(err, DslError::AsyncOnly("source.fetch".to_string()));
    }

    #[tokio::test]
    async fn test_async_executor_runs_sync_handlers() {
        let mut ctx = ExecutionContext::new();
        executor()
            .execute_async("data.load() | metrics.count()", &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.data, json!(3));
    }
}
