//! Pipeline execution: the executor and its lifecycle hooks

pub mod executor;
pub mod hooks;

pub use executor::{Executor, PipelineSource};
pub use hooks::{EventHandler, EventHook, ExecutionEvent, ExecutionHook, LoggingHook, TracingHook};
