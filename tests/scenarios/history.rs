//! Test: History - run summaries saved after execution

use crate::helpers::*;
use atom_pipeline::persistence::{create_summary, HistoryBackend, InMemoryHistory};
use atom_pipeline::{ErrorPolicy, ExecutionContext, ExecutionStatus};

/// Test summaries reflect the run they came from
#[tokio::test]
async fn test_summaries_from_runs() {
    let history = InMemoryHistory::new();

    let ok = with_policy("@pipeline nightly:\n  data.load() | alert.fail()", 1, ErrorPolicy::Skip);
    let run = run_with(TestRegistry::new(), &ok, ExecutionContext::new(), Vec::new());
    history
        .save_run(&create_summary(&ok, &run.ctx, run.status()))
        .await
        .unwrap();

    let failed = atom_pipeline::parse("@pipeline nightly:\n  alert.fail()").unwrap();
    let run = run_with(TestRegistry::new(), &failed, ExecutionContext::new(), Vec::new());
    let summary = create_summary(&failed, &run.ctx, run.status());
    history.save_run(&summary).await.unwrap();

    let runs = history.list_runs(Some("nightly"), 10).await.unwrap();
    assert_eq!(runs.len(), 2);

    let statuses: Vec<ExecutionStatus> = runs.iter().map(|r| r.status).collect();
    assert!(statuses.contains(&ExecutionStatus::CompletedWithErrors));
    assert!(statuses.contains(&ExecutionStatus::Failed));

    let loaded = history.load_run(summary.execution_id).await.unwrap().unwrap();
    assert_eq!(loaded.error_count, 1);
    assert_eq!(loaded.step_count, 1);
}

/// Test the SQLite backend with a real run
#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_history_from_run() {
    use atom_pipeline::persistence::SqliteHistory;

    let history = SqliteHistory::in_memory().await.unwrap();
    let pipeline = atom_pipeline::parse("@pipeline weekly:\n  data.load() | metrics.count()").unwrap();
    let run = run_with(TestRegistry::new(), &pipeline, ExecutionContext::new(), Vec::new());
    let summary = create_summary(&pipeline, &run.ctx, run.status());
    history.save_run(&summary).await.unwrap();

    let loaded = history.load_run(summary.execution_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Completed);
    assert_eq!(loaded.step_count, 2);
    assert_eq!(history.list_pipelines().await.unwrap(), vec!["weekly"]);
}

/// Test a run recorded as running is replaced by its final summary
#[tokio::test]
async fn test_running_entry_replaced_when_run_finishes() {
    let history = InMemoryHistory::new();
    let pipeline = atom_pipeline::parse("@pipeline hourly:\n  data.load() | metrics.count()").unwrap();
    let ctx = ExecutionContext::new();

    let started = create_summary(&pipeline, &ctx, ExecutionStatus::Running);
    history.save_run(&started).await.unwrap();
    let pending = history.load_run(started.execution_id).await.unwrap().unwrap();
    assert_eq!(pending.status, ExecutionStatus::Running);
    assert!(!pending.status.is_success());
    assert_eq!(pending.duration_ms(), None);

    let run = run_with(TestRegistry::new(), &pipeline, ctx, Vec::new());
    history
        .save_run(&create_summary(&pipeline, &run.ctx, run.status()))
        .await
        .unwrap();

    let runs = history.list_runs(Some("hourly"), 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].execution_id, started.execution_id);
    assert!(runs[0].status.is_success());
    assert_eq!(runs[0].step_count, 2);
    assert_eq!(history.list_pipelines().await.unwrap(), vec!["hourly"]);
}
