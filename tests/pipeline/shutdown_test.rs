use std::sync::Arc;
use std::time::Duration;

use docload::metrics::Metrics;
use docload::pipeline::{ShutdownCoordinator, WorkerOutcome};
use docload::store::MemoryStore;
use docload::HarnessError;

use super::{settings, CountingSink, ScriptedSource, SlowSource};

#[tokio::test]
async fn test_render_error_aborts_run_without_export() {
    let store = Arc::new(MemoryStore::default());
    let metrics = Arc::new(Metrics::new().unwrap());
    let sink = Arc::new(CountingSink::default());
    let source = ScriptedSource::new(Vec::new(), Some(4));
    let coordinator = ShutdownCoordinator::new(
        settings(3, Duration::from_secs(30)),
        source.clone(),
        store.clone(),
        Arc::clone(&metrics),
        sink.clone(),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("a render failure should end the run long before the worker budget");
    assert!(matches!(result, Err(HarnessError::Render(_))));
    assert_eq!(sink.exports(), 0);
    assert_eq!(source.calls(), 4);

    // workers were aborted, so nothing keeps inserting
    let requests = metrics.snapshot().requests;
    let inserted = store.count("one");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(metrics.snapshot().requests, requests);
    assert_eq!(store.count("one"), inserted);
}

#[tokio::test]
async fn test_failed_first_render_starts_no_inserts() {
    let store = Arc::new(MemoryStore::default());
    let metrics = Arc::new(Metrics::new().unwrap());
    let sink = Arc::new(CountingSink::default());
    let coordinator = ShutdownCoordinator::new(
        settings(2, Duration::from_secs(30)),
        ScriptedSource::new(Vec::new(), Some(1)),
        store.clone(),
        Arc::clone(&metrics),
        sink.clone(),
    );

    let err = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("waiting workers should be aborted, not left to run out their budget")
        .unwrap_err();
    assert!(err.to_string().starts_with("document producer failed"));
    assert_eq!(sink.exports(), 0);
    assert_eq!(metrics.snapshot().requests, 0);
    assert_eq!(metrics.snapshot().render_count, 0);
    assert_eq!(store.total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_stop_on_budget_under_parallel_runtime() {
    let budget = Duration::from_millis(250);
    let store = Arc::new(MemoryStore::new(Some(Duration::from_millis(1)), 0));
    let coordinator = ShutdownCoordinator::new(
        settings(8, budget),
        ScriptedSource::healthy(),
        store.clone(),
        Arc::new(Metrics::new().unwrap()),
        Arc::new(CountingSink::default()),
    );

    let summary = tokio::time::timeout(budget + Duration::from_secs(3), coordinator.run())
        .await
        .expect("workers should stop shortly after their budget")
        .unwrap();

    assert_eq!(summary.workers.len(), 8);
    for report in &summary.workers {
        // at most one in-flight insert past the deadline
        assert!(report.elapsed < budget + Duration::from_millis(500), "{report:?}");
    }
    assert_eq!(summary.metrics.requests, summary.total_attempts());
    assert_eq!(store.total(), summary.total_attempts());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_producer_does_not_stretch_worker_budget() {
    let budget = Duration::from_millis(200);
    let store = Arc::new(MemoryStore::default());
    let coordinator = ShutdownCoordinator::new(
        settings(5, budget),
        Arc::new(SlowSource {
            delay: Duration::from_millis(100),
        }),
        store.clone(),
        Arc::new(Metrics::new().unwrap()),
        Arc::new(CountingSink::default()),
    );

    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.workers.len(), 5);
    for report in &summary.workers {
        assert!(report.elapsed >= budget, "{report:?}");
        assert!(report.elapsed < budget + Duration::from_millis(150), "{report:?}");
        if report.outcome == WorkerOutcome::Starved {
            assert_eq!(report.attempts, 0);
        }
    }
    assert!(summary.workers.iter().any(|w| w.outcome == WorkerOutcome::Completed));
    assert!(summary.workers.iter().any(|w| w.outcome == WorkerOutcome::Starved));
    assert_eq!(store.total(), summary.total_attempts());
}
