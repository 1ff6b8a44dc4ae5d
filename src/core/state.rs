//! Execution state models

use crate::core::{context::ExecutionContext, error::DslError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overall outcome of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline is currently running
    Running,
    /// Every step completed without a recorded error
    Completed,
    /// All steps ran but some failures were skipped or retried
    CompletedWithErrors,
    /// A failure propagated and halted the run
    Failed,
}

impl ExecutionStatus {
    /// Classify a finished run from the executor's result and the context it left behind
    pub fn from_outcome(result: &Result<(), DslError>, ctx: &ExecutionContext) -> Self {
        match result {
            Err(_) => ExecutionStatus::Failed,
            Ok(()) if ctx.has_errors() => ExecutionStatus::CompletedWithErrors,
            Ok(()) => ExecutionStatus::Completed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::CompletedWithErrors
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::CompletedWithErrors => "CompletedWithErrors",
            ExecutionStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(ExecutionStatus::Running),
            "Completed" => Ok(ExecutionStatus::Completed),
            "CompletedWithErrors" => Ok(ExecutionStatus::CompletedWithErrors),
            "Failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}
