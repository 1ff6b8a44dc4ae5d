//! Lifecycle hooks invoked by the executor

use crate::core::{
    context::{ExecutionContext, LogLevel},
    error::DslError,
    pipeline::PipelineDefinition,
    state::ExecutionStatus,
    step::{ErrorPolicy, PipelineStep},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Observer of a pipeline run
///
/// Hooks run in registration order. Every method has a no-op default so an
/// implementation only overrides what it needs. `index` is the 0-based step
/// position in the pipeline.
pub trait ExecutionHook: Send + Sync {
    fn before_pipeline(&self, _pipeline: &PipelineDefinition, _ctx: &mut ExecutionContext) {}

    /// Always runs once the pipeline has started, whether it succeeded or not
    fn after_pipeline(
        &self,
        _pipeline: &PipelineDefinition,
        _ctx: &mut ExecutionContext,
        _result: &Result<(), DslError>,
    ) {
    }

    fn before_step(&self, _step: &PipelineStep, _index: usize, _ctx: &mut ExecutionContext) {}

    /// `result` is what the handler returned; `None` means the data was left as is
    fn after_step(
        &self,
        _step: &PipelineStep,
        _index: usize,
        _result: Option<&Value>,
        _ctx: &mut ExecutionContext,
    ) {
    }

    fn on_error(
        &self,
        _step: &PipelineStep,
        _index: usize,
        _error: &DslError,
        _ctx: &mut ExecutionContext,
    ) {
    }

    /// A failed `retry` step is about to be invoked a second time
    fn on_retry(&self, _step: &PipelineStep, _index: usize, _ctx: &mut ExecutionContext) {}
}

/// Writes lifecycle lines into the context's own log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHook;

impl ExecutionHook for LoggingHook {
    fn before_pipeline(&self, pipeline: &PipelineDefinition, ctx: &mut ExecutionContext) {
        ctx.log(format!("Starting pipeline: {}", pipeline.name), LogLevel::Info);
    }

    fn after_pipeline(
        &self,
        _pipeline: &PipelineDefinition,
        ctx: &mut ExecutionContext,
        _result: &Result<(), DslError>,
    ) {
        let elapsed = ctx.execution_time_ms();
        ctx.log(
            format!("Pipeline completed in {:.2}ms", elapsed),
            LogLevel::Info,
        );
    }

    fn before_step(&self, step: &PipelineStep, _index: usize, ctx: &mut ExecutionContext) {
        ctx.log(format!("Executing: {}", step.identifier()), LogLevel::Info);
    }

    fn on_error(
        &self,
        step: &PipelineStep,
        _index: usize,
        error: &DslError,
        ctx: &mut ExecutionContext,
    ) {
        ctx.log(
            format!("Error in {}: {}", step.identifier(), error),
            LogLevel::Error,
        );
    }
}

/// Mirrors hook callbacks to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl ExecutionHook for TracingHook {
    fn before_pipeline(&self, pipeline: &PipelineDefinition, ctx: &mut ExecutionContext) {
        info!(
            "Starting pipeline: {} ({}, {} steps)",
            pipeline.name,
            ctx.execution_id,
            pipeline.steps.len()
        );
    }

    fn after_pipeline(
        &self,
        pipeline: &PipelineDefinition,
        ctx: &mut ExecutionContext,
        result: &Result<(), DslError>,
    ) {
        let status = ExecutionStatus::from_outcome(result, ctx);
        match result {
            Ok(()) => info!(
                "Pipeline {} finished: {} in {:.2}ms ({} errors)",
                pipeline.name,
                status,
                ctx.execution_time_ms(),
                ctx.errors.len()
            ),
            Err(e) => error!("Pipeline {} failed: {}", pipeline.name, e),
        }
    }

    fn before_step(&self, step: &PipelineStep, index: usize, ctx: &mut ExecutionContext) {
        debug!(
            "[{}] step {}: {}",
            ctx.execution_id,
            index + 1,
            step.identifier()
        );
    }

    fn after_step(
        &self,
        step: &PipelineStep,
        index: usize,
        result: Option<&Value>,
        _ctx: &mut ExecutionContext,
    ) {
        debug!(
            "Step {} ({}) completed, data {}",
            index + 1,
            step.atom.qualified_name(),
            if result.is_some() { "replaced" } else { "unchanged" }
        );
    }

    fn on_error(
        &self,
        step: &PipelineStep,
        index: usize,
        error: &DslError,
        _ctx: &mut ExecutionContext,
    ) {
        warn!(
            "Step {} ({}) failed with policy {}: {}",
            index + 1,
            step.atom.qualified_name(),
            step.on_error,
            error
        );
    }

    fn on_retry(&self, step: &PipelineStep, index: usize, _ctx: &mut ExecutionContext) {
        info!("Retrying step {} ({})", index + 1, step.atom.qualified_name());
    }
}

/// Events emitted by [`EventHook`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        step: String,
    },
    StepCompleted {
        index: usize,
        step: String,
        data_replaced: bool,
    },
    StepFailed {
        index: usize,
        step: String,
        error: String,
        policy: ErrorPolicy,
    },
    StepRetrying {
        index: usize,
        step: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
        duration_ms: f64,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Adapts hook callbacks into [`ExecutionEvent`]s for a single handler
#[derive(Clone)]
pub struct EventHook {
    handler: EventHandler,
}

impl EventHook {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        (self.handler)(event);
    }
}

impl ExecutionHook for EventHook {
    fn before_pipeline(&self, pipeline: &PipelineDefinition, ctx: &mut ExecutionContext) {
        self.emit(ExecutionEvent::PipelineStarted {
            execution_id: ctx.execution_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: pipeline.steps.len(),
        });
    }

    fn after_pipeline(
        &self,
        _pipeline: &PipelineDefinition,
        ctx: &mut ExecutionContext,
        result: &Result<(), DslError>,
    ) {
        self.emit(ExecutionEvent::PipelineCompleted {
            execution_id: ctx.execution_id,
            status: ExecutionStatus::from_outcome(result, ctx),
            duration_ms: ctx.execution_time_ms(),
        });
    }

    fn before_step(&self, step: &PipelineStep, index: usize, _ctx: &mut ExecutionContext) {
        self.emit(ExecutionEvent::StepStarted {
            index,
            step: step.identifier(),
        });
    }

    fn after_step(
        &self,
        step: &PipelineStep,
        index: usize,
        result: Option<&Value>,
        _ctx: &mut ExecutionContext,
    ) {
        self.emit(ExecutionEvent::StepCompleted {
            index,
            step: step.identifier(),
            data_replaced: result.is_some(),
        });
    }

    fn on_error(
        &self,
        step: &PipelineStep,
        index: usize,
        error: &DslError,
        _ctx: &mut ExecutionContext,
    ) {
        self.emit(ExecutionEvent::StepFailed {
            index,
            step: step.identifier(),
            error: error.to_string(),
            policy: step.on_error,
        });
    }

    fn on_retry(&self, step: &PipelineStep, index: usize, _ctx: &mut ExecutionContext) {
        self.emit(ExecutionEvent::StepRetrying {
            index,
            step: step.identifier(),
        });
    }
}
