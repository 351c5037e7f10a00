use std::sync::Arc;
use std::time::{Duration, Instant};

use docload::metrics::{Metrics, NoopSink};
use docload::pipeline::{ShutdownCoordinator, WorkerOutcome};
use docload::store::MemoryStore;
use docload::templates::{DocumentSource, TemplateRenderer};

use super::{settings, CountingSink, ScriptedSource};

#[tokio::test]
async fn test_all_workers_finish_and_metrics_flush_once() {
    let budget = Duration::from_millis(300);
    let store = Arc::new(MemoryStore::new(None, 16));
    let metrics = Arc::new(Metrics::new().unwrap());
    let sink = Arc::new(CountingSink::default());
    let coordinator = ShutdownCoordinator::new(
        settings(3, budget),
        ScriptedSource::healthy(),
        store.clone(),
        Arc::clone(&metrics),
        sink.clone(),
    );

    let started = Instant::now();
    let summary = coordinator.run().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.workers.len(), 3);
    assert!(summary.workers.iter().all(|w| w.outcome == WorkerOutcome::Completed));
    assert!(summary.workers.iter().all(|w| w.elapsed >= budget));
    assert!(elapsed < budget + Duration::from_secs(2), "run took {elapsed:?}");

    assert_eq!(sink.exports(), 1);
    assert!(summary.metrics_exported);

    // one render per queued payload plus at most the one abandoned at shutdown
    assert!(summary.producer.rendered >= 3);
    assert!(summary.producer.rendered - summary.producer.published <= 1);

    assert_eq!(summary.total_attempts(), summary.metrics.requests);
    assert_eq!(store.count("one"), summary.total_attempts());
    assert_eq!(metrics.snapshot().requests, summary.metrics.requests);
}

#[tokio::test]
async fn test_render_histogram_matches_producer_count() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let coordinator = ShutdownCoordinator::new(
        settings(2, Duration::from_millis(100)),
        ScriptedSource::healthy(),
        Arc::new(MemoryStore::default()),
        Arc::clone(&metrics),
        Arc::new(NoopSink),
    );
    let summary = coordinator.run().await.unwrap();

    // the exported snapshot can miss the one render still running at cancellation
    assert!(summary.metrics.render_count <= summary.producer.rendered);
    assert!(summary.producer.rendered - summary.metrics.render_count <= 1);
    assert_eq!(metrics.snapshot().render_count, summary.producer.rendered);
}

#[tokio::test]
async fn test_malformed_first_payload_stops_only_that_worker() {
    let store = Arc::new(MemoryStore::default());
    let coordinator = ShutdownCoordinator::new(
        settings(3, Duration::from_millis(150)),
        ScriptedSource::new(vec![1], None),
        store.clone(),
        Arc::new(Metrics::new().unwrap()),
        Arc::new(NoopSink),
    );

    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.decode_failures(), 1);

    let failed: Vec<_> = summary
        .workers
        .iter()
        .filter(|w| w.outcome == WorkerOutcome::DecodeFailed)
        .collect();
    assert_eq!(failed[0].attempts, 0);

    let completed: Vec<_> = summary
        .workers
        .iter()
        .filter(|w| w.outcome == WorkerOutcome::Completed)
        .collect();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().all(|w| w.attempts > 0));
    assert_eq!(store.count("one"), summary.total_attempts());
}

#[tokio::test]
async fn test_refresh_mode_counts_fresh_payloads() {
    let mut run = settings(2, Duration::from_millis(150));
    run.reuse_payload = false;
    let coordinator = ShutdownCoordinator::new(
        run,
        ScriptedSource::healthy(),
        Arc::new(MemoryStore::default()),
        Arc::new(Metrics::new().unwrap()),
        Arc::new(NoopSink),
    );

    let summary = coordinator.run().await.unwrap();
    let fresh: u64 = summary.workers.iter().map(|w| w.fresh_payloads).sum();
    assert!(fresh > 0);
    assert!(summary.workers.iter().all(|w| w.fresh_payloads <= w.attempts));
}

#[tokio::test]
async fn test_shipped_template_renders_a_document() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");
    let renderer = TemplateRenderer::load(dir).unwrap();
    assert!(renderer.names().iter().any(|n| n == "file1.template"));

    for _ in 0..5 {
        let rendered = renderer.render("file1.template").unwrap();
        let document: serde_json::Value = serde_json::from_str(&rendered)
            .unwrap_or_else(|e| panic!("rendered template is not JSON ({e}):\n{rendered}"));
        assert!(document.is_object());
        assert_eq!(document["order_id"].as_str().map(str::len), Some(36));
        assert!(!document["lines"].as_array().unwrap().is_empty());
    }
}
