//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteHistory;

pub use crate::core::ExecutionStatus;
use crate::core::{ExecutionContext, PipelineDefinition};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Execution ID of the context the run used
    pub execution_id: Uuid,

    pub pipeline_name: String,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Steps entered, including the one that failed
    pub step_count: usize,

    /// Error records left in the context
    pub error_count: usize,
}

impl RunSummary {
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| done.signed_duration_since(self.started_at).num_milliseconds())
    }
}

/// Storage for run summaries
#[async_trait::async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Insert or replace a summary keyed by its execution ID
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    async fn load_run(&self, execution_id: Uuid) -> Result<Option<RunSummary>>;

    /// Newest first, optionally restricted to one pipeline
    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>>;

    /// Distinct pipeline names, sorted
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory history (for testing or `--no-history` runs)
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HistoryBackend for InMemoryHistory {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.execution_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, execution_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&execution_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|run| pipeline_name.map_or(true, |name| run.pipeline_name == name))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|run| run.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Create a summary from a finished (or running) context
pub fn create_summary(
    pipeline: &PipelineDefinition,
    ctx: &ExecutionContext,
    status: ExecutionStatus,
) -> RunSummary {
    RunSummary {
        execution_id: ctx.execution_id,
        pipeline_name: pipeline.name.clone(),
        status,
        started_at: ctx.started_at,
        completed_at: (status != ExecutionStatus::Running).then(Utc::now),
        step_count: ctx.step_count,
        error_count: ctx.errors.len(),
    }
}

/// `<local data dir>/atompipe/history.db`, or the working directory when there is none
pub fn default_history_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atompipe")
        .join("history.db")
}
