use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::producer::{DocumentProducer, ProducerReport};
use super::queue::BoundedQueue;
use super::worker::{InsertWorker, WorkerOutcome, WorkerReport};
use crate::config::Config;
use crate::error::HarnessError;
use crate::metrics::{Metrics, MetricsSink, MetricsSnapshot, NoopSink, PushGateway};
use crate::payload::Payload;
use crate::store::{self, DocumentStore};
use crate::templates::{DocumentSource, TemplateError, TemplateRenderer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub workers: usize,
    pub worker_budget: Duration,
    pub queue_capacity: usize,
    pub template: String,
    pub collection: String,
    pub reuse_payload: bool,
}

impl From<&Config> for RunSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            workers: cfg.run.workers,
            worker_budget: cfg.run.worker_budget(),
            queue_capacity: cfg.run.queue_capacity,
            template: cfg.run.template.clone(),
            collection: cfg.store.collection.clone(),
            reuse_payload: cfg.run.reuse_payload,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub workers: Vec<WorkerReport>,
    pub producer: ProducerReport,
    /// Collector values at the moment of export.
    pub metrics: MetricsSnapshot,
    pub metrics_exported: bool,
}

impl RunSummary {
    pub fn total_attempts(&self) -> u64 {
        self.workers.iter().map(|w| w.attempts).sum()
    }

    pub fn decode_failures(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.outcome == WorkerOutcome::DecodeFailed)
            .count()
    }
}

/// Owns the run lifecycle: start the producer and the workers, wait for every
/// worker to finish, stop the producer, flush metrics.
pub struct ShutdownCoordinator {
    settings: RunSettings,
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
    sink: Arc<dyn MetricsSink>,
}

impl ShutdownCoordinator {
    pub fn new(
        settings: RunSettings,
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn DocumentStore>,
        metrics: Arc<Metrics>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            settings,
            source,
            store,
            metrics,
            sink,
        }
    }

    /// Load templates, connect the store and prepare the metrics sink.
    /// Any failure here aborts before a single worker starts.
    pub async fn from_config(cfg: &Config) -> Result<Self, HarnessError> {
        let source = TemplateRenderer::load(&cfg.templates.directory).map_err(HarnessError::Templates)?;
        let store = store::connect(&cfg.store).await?;
        let metrics = Arc::new(Metrics::new()?);
        let sink: Arc<dyn MetricsSink> = if cfg.metrics.enabled {
            let gateway = PushGateway::from_config(&cfg.metrics)?;
            info!(url = %gateway.url(), "metrics will be pushed at the end of the run");
            Arc::new(gateway)
        } else {
            Arc::new(NoopSink)
        };

        Ok(Self::new(RunSettings::from(cfg), Arc::new(source), store, metrics, sink))
    }

    pub async fn run(self) -> Result<RunSummary, HarnessError> {
        let settings = &self.settings;
        let queue = BoundedQueue::<Payload>::new(settings.queue_capacity);
        let cancel = CancellationToken::new();

        let producer = DocumentProducer::new(
            Arc::clone(&self.source),
            settings.template.clone(),
            queue.clone(),
            Arc::clone(&self.metrics),
        );
        let mut producer_task = tokio::spawn(producer.run(cancel.clone()));

        let collection: Arc<str> = Arc::from(settings.collection.as_str());
        let mut workers = JoinSet::new();
        for id in 0..settings.workers {
            let worker = InsertWorker::new(
                id,
                queue.clone(),
                Arc::clone(&self.store),
                Arc::clone(&collection),
                Arc::clone(&self.metrics),
                settings.worker_budget,
            )
            .reuse_payload(settings.reuse_payload);
            workers.spawn(worker.run());
        }
        drop(queue);

        info!(
            workers = settings.workers,
            budget_secs = settings.worker_budget.as_secs_f64(),
            template = %settings.template,
            "making requests until timeout"
        );

        let mut reports = Vec::with_capacity(settings.workers);
        let mut producer_report = None;
        loop {
            tokio::select! {
                biased;
                finished = &mut producer_task, if producer_report.is_none() => {
                    match producer_outcome(finished) {
                        Ok(report) => {
                            warn!(rendered = report.rendered, "document producer stopped before the workers finished");
                            producer_report = Some(report);
                        }
                        Err(e) => {
                            error!(error = %e, "aborting run");
                            workers.shutdown().await;
                            cancel.cancel();
                            return Err(e);
                        }
                    }
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(report)) => reports.push(report),
                    Some(Err(e)) => error!(error = %e, "insert worker did not complete"),
                    None => break,
                },
            }
        }

        cancel.cancel();
        // A producer that already failed ends the run without an export. One
        // that fails after this check still races the export below.
        if producer_report.is_none() && producer_task.is_finished() {
            match producer_outcome((&mut producer_task).await) {
                Ok(report) => producer_report = Some(report),
                Err(e) => {
                    error!(error = %e, "aborting run");
                    return Err(e);
                }
            }
        }

        // Export does not wait for a producer still mid-render, so that render
        // is not part of the pushed histogram.
        let metrics = self.metrics.snapshot();
        let metrics_exported = match self.sink.export(&self.metrics).await {
            Ok(()) => {
                info!(requests = metrics.requests, renders = metrics.render_count, "metrics flushed");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to push metrics");
                false
            }
        };

        let producer = match producer_report {
            Some(report) => report,
            None => producer_outcome(producer_task.await)?,
        };

        reports.sort_by_key(|r| r.worker_id);
        let summary = RunSummary {
            workers: reports,
            producer,
            metrics,
            metrics_exported,
        };
        info!(
            total_attempts = summary.total_attempts(),
            decode_failures = summary.decode_failures(),
            "all insert workers finished"
        );
        Ok(summary)
    }
}

fn producer_outcome(
    joined: Result<Result<ProducerReport, TemplateError>, JoinError>,
) -> Result<ProducerReport, HarnessError> {
    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(HarnessError::Render(e)),
        Err(e) => Err(HarnessError::ProducerPanicked(e.to_string())),
    }
}
