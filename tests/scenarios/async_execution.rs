//! Test: Async Execution - awaiting async handlers alongside sync ones

use crate::helpers::*;
use atom_pipeline::{DslError, ExecutionContext};
use serde_json::json;

/// Test that the async executor awaits async handlers in order
#[tokio::test]
async fn test_async_handler_feeds_sync_steps() {
    let (executor, calls, _) = TestRegistry::new().executor();
    let mut ctx = ExecutionContext::new();

    executor
        .execute_async(
            r#"source.fetch(table="sales") | transform.filter(status="active") | metrics.count()"#,
            &mut ctx,
        )
        .await
        .unwrap();

    assert_eq!(ctx.data, json!(3));
    assert_eq!(ctx.get_metadata("fetched_from"), Some(&json!("remote")));
    assert_eq!(calls.lock().unwrap().as_slice(), [r#"source.fetch {"table":"sales"}"#]);
}

/// Test that the sync executor refuses async-only handlers
#[test]
fn test_sync_executor_rejects_async_handler() {
    let run = run_dsl("data.load() | source.fetch()");

    assert_failed(&run);
    assert_eq!(
        run.result,
        Err(DslError::AsyncOnly("source.fetch".to_string()))
    );
    assert_call_order(&run, &["data.load"]);
}

/// Test independent runs on separate contexts concurrently
#[tokio::test]
async fn test_concurrent_runs_share_executor() {
    let (executor, _, _) = TestRegistry::new().executor();
    let executor = std::sync::Arc::new(executor);

    let mut handles = Vec::new();
    for region in ["EU", "US", "APAC"] {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let mut ctx = ExecutionContext::new();
            ctx.set_var("region", json!(region));
            executor
                .execute_async(
                    "source.fetch() | transform.filter(region=$region) | metrics.count()",
                    &mut ctx,
                )
                .await
                .map(|_| ctx.data)
        }));
    }

    let mut counts = Vec::new();
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(counts, vec![json!(2), json!(1), json!(1)]);
}
