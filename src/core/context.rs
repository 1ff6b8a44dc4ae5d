//! Execution context - state threaded through one pipeline run

use crate::core::{
    atom::Params,
    error::{DslError, ErrorKind},
    resolve,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Severity of a context log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// A log line recorded on the context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Step counter value when the entry was written
    pub step: usize,
}

/// A failure recorded on the context, whether or not it was recovered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub kind: ErrorKind,
    /// DSL form of the failing step, or `step_N` when none was given
    pub step: String,
    /// Step counter value when the failure was recorded (1-based, 0 before any step)
    pub step_index: usize,
    pub timestamp: DateTime<Utc>,
}

/// The narrow view of a context that atom handlers receive
pub trait AtomContext: Send {
    /// Current data value (the previous step's output)
    fn data(&self) -> &Value;

    fn set_data(&mut self, data: Value);

    fn variable(&self, name: &str) -> Option<&Value>;

    fn set_variable(&mut self, name: &str, value: Value);

    fn metadata(&self, key: &str) -> Option<&Value>;

    fn set_metadata(&mut self, key: &str, value: Value);

    fn domain(&self) -> Option<&str>;

    fn log(&mut self, message: &str, level: LogLevel);

    /// Record an error entry without failing the step
    fn error(&mut self, message: &str, step: Option<&str>);
}

/// Mutable state of one pipeline run
///
/// Owned by a single execution; clone it (or use [`ExecutionContext::clone_for_run`])
/// to start another run from the same inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: Uuid,

    pub variables: HashMap<String, Value>,

    pub domain: Option<String>,

    pub user_id: Option<String>,

    pub org_id: Option<String>,

    /// Current data value; each step's non-null result replaces it
    pub data: Value,

    pub metadata: HashMap<String, Value>,

    pub errors: Vec<ErrorRecord>,

    pub logs: Vec<LogEntry>,

    pub started_at: DateTime<Utc>,

    pub step_count: usize,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            variables: HashMap::new(),
            domain: None,
            user_id: None,
            org_id: None,
            data: Value::Null,
            metadata: HashMap::new(),
            errors: Vec::new(),
            logs: Vec::new(),
            started_at: Utc::now(),
            step_count: 0,
        }
    }

    pub fn with_variables(variables: HashMap<String, Value>) -> Self {
        Self {
            variables,
            ..Self::new()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>, org_id: Option<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.org_id = org_id;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn increment_step(&mut self) {
        self.step_count += 1;
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn execution_time_ms(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0
    }

    pub fn log(&mut self, message: impl Into<String>, level: LogLevel) {
        self.logs.push(LogEntry {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            step: self.step_count,
        });
    }

    /// Append an error record and a matching error-level log line
    pub fn record_error(&mut self, message: impl Into<String>, kind: ErrorKind, step: Option<&str>) {
        let message = message.into();
        let step = step
            .map(str::to_string)
            .unwrap_or_else(|| format!("step_{}", self.step_count));
        self.errors.push(ErrorRecord {
            message: message.clone(),
            kind,
            step,
            step_index: self.step_count,
            timestamp: Utc::now(),
        });
        self.log(format!("ERROR: {}", message), LogLevel::Error);
    }

    /// Record a [`DslError`] against a step
    pub fn record_failure(&mut self, err: &DslError, step: &str) {
        self.record_error(err.to_string(), err.kind(), Some(step));
    }

    /// Resolve a single value against the current variables
    pub fn resolve_variable(&self, value: &Value) -> Result<Value, DslError> {
        resolve::resolve_value(value, &|name: &str| self.variables.get(name).cloned())
    }

    /// Resolve every parameter against the current variables
    pub fn resolve_params(&self, params: &Params) -> Result<Params, DslError> {
        resolve::resolve_params(params, &|name: &str| self.variables.get(name).cloned())
    }

    /// Copy of inputs (variables, identity, data, metadata) with fresh logs,
    /// errors, counters and execution id
    pub fn clone_for_run(&self) -> Self {
        Self {
            variables: self.variables.clone(),
            domain: self.domain.clone(),
            user_id: self.user_id.clone(),
            org_id: self.org_id.clone(),
            data: self.data.clone(),
            metadata: self.metadata.clone(),
            ..Self::new()
        }
    }

    /// Overview of the run without data or full log contents
    pub fn summary(&self) -> Value {
        json!({
            "execution_id": self.execution_id.to_string(),
            "domain": self.domain,
            "user_id": self.user_id,
            "org_id": self.org_id,
            "variables": self.variables,
            "metadata": self.metadata,
            "step_count": self.step_count,
            "execution_time_ms": self.execution_time_ms(),
            "has_errors": self.has_errors(),
            "error_count": self.errors.len(),
            "log_count": self.logs.len(),
        })
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomContext for ExecutionContext {
    fn data(&self) -> &Value {
        &self.data
    }

    fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    fn set_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    fn log(&mut self, message: &str, level: LogLevel) {
        ExecutionContext::log(self, message, level);
    }

    fn error(&mut self, message: &str, step: Option<&str>) {
        self.record_error(message, ErrorKind::Handler, step);
    }
}
