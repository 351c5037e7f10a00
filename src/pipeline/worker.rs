use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use super::queue::BoundedQueue;
use crate::metrics::Metrics;
use crate::payload::Payload;
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Ran until its budget elapsed.
    Completed,
    /// First payload could not be decoded; no inserts were issued.
    DecodeFailed,
    /// Queue closed before a first payload arrived.
    QueueClosed,
    /// Budget ran out while waiting for a first payload.
    Starved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub attempts: u64,
    pub failed_inserts: u64,
    pub fresh_payloads: u64,
    pub outcome: WorkerOutcome,
    pub elapsed: Duration,
}

impl WorkerReport {
    fn stopped_early(worker_id: usize, outcome: WorkerOutcome, elapsed: Duration) -> Self {
        Self {
            worker_id,
            attempts: 0,
            failed_inserts: 0,
            fresh_payloads: 0,
            outcome,
            elapsed,
        }
    }
}

/// Inserts documents into the store until its time budget runs out.
pub struct InsertWorker {
    id: usize,
    queue: BoundedQueue<Payload>,
    store: Arc<dyn DocumentStore>,
    collection: Arc<str>,
    metrics: Arc<Metrics>,
    budget: Duration,
    reuse_payload: bool,
}

impl InsertWorker {
    pub fn new(
        id: usize,
        queue: BoundedQueue<Payload>,
        store: Arc<dyn DocumentStore>,
        collection: Arc<str>,
        metrics: Arc<Metrics>,
        budget: Duration,
    ) -> Self {
        Self {
            id,
            queue,
            store,
            collection,
            metrics,
            budget,
            reuse_payload: true,
        }
    }

    /// With `false`, a payload already waiting in the queue replaces the held
    /// document before the next insert.
    pub fn reuse_payload(mut self, reuse: bool) -> Self {
        self.reuse_payload = reuse;
        self
    }

    /// The budget runs from the moment the worker starts, so time spent
    /// waiting for the first payload counts against it.
    pub async fn run(self) -> WorkerReport {
        let started = Instant::now();
        let deadline = started + self.budget;
        let worker_id = self.id;
        debug!(worker_id, "starting insert worker");

        let first = match timeout_at(deadline, self.queue.pop()).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(_)) => {
                warn!(worker_id, "payload queue closed before a first document arrived");
                return WorkerReport::stopped_early(worker_id, WorkerOutcome::QueueClosed, started.elapsed());
            }
            Err(_) => {
                warn!(worker_id, "budget elapsed before a first document arrived");
                return WorkerReport::stopped_early(worker_id, WorkerOutcome::Starved, started.elapsed());
            }
        };

        let mut document = match first.decode() {
            Ok(document) => document,
            Err(e) => {
                error!(worker_id, error = %e, payload = %first, "error converting payload to a document");
                return WorkerReport::stopped_early(worker_id, WorkerOutcome::DecodeFailed, started.elapsed());
            }
        };
        info!(
            worker_id,
            waited_ms = started.elapsed().as_millis() as u64,
            payload_bytes = first.len(),
            "got first payload"
        );

        let mut attempts = 0u64;
        let mut failed_inserts = 0u64;
        let mut fresh_payloads = 0u64;

        while Instant::now() < deadline {
            if !self.reuse_payload {
                if let Some(fresh) = self.queue.try_pop() {
                    match fresh.decode() {
                        Ok(fresh) => {
                            document = fresh;
                            fresh_payloads += 1;
                        }
                        Err(e) => warn!(worker_id, error = %e, "skipping undecodable payload"),
                    }
                }
            }

            self.metrics.inc_requests();
            attempts += 1;
            if let Err(e) = self.store.insert_one(&self.collection, &document).await {
                failed_inserts += 1;
                self.metrics.inc_insert_errors();
                debug!(worker_id, error = %e, "insert failed");
            }
        }

        info!(
            worker_id,
            attempts,
            failed_inserts,
            new_templates_received = fresh_payloads,
            old_templates_used = attempts - fresh_payloads,
            "insert worker timed out"
        );

        WorkerReport {
            worker_id,
            attempts,
            failed_inserts,
            fresh_payloads,
            outcome: WorkerOutcome::Completed,
            elapsed: started.elapsed(),
        }
    }
}
