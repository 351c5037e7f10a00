use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::{Document, DocumentStore, StoreBackend, StoreError};
use crate::config::StoreConfig;

/// In-process store. Counts inserts per collection and optionally keeps the
/// first `retain_limit` documents for inspection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    latency: Option<Duration>,
    retain_limit: usize,
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    counts: HashMap<String, u64>,
    retained: Vec<(String, Document)>,
}

impl MemoryStore {
    pub fn new(latency: Option<Duration>, retain_limit: usize) -> Self {
        Self {
            latency,
            retain_limit,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> Self {
        let latency = (cfg.insert_latency_ms > 0).then(|| Duration::from_millis(cfg.insert_latency_ms));
        Self::new(latency, cfg.retain_limit)
    }

    pub fn count(&self, collection: &str) -> u64 {
        self.inner.lock().counts.get(collection).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.inner.lock().counts.values().sum()
    }

    pub fn retained(&self) -> Vec<(String, Document)> {
        self.inner.lock().retained.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, document: &Document) -> Result<(), StoreError> {
        // Always suspend once so a tight insert loop cannot monopolise a runtime thread.
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        let mut inner = self.inner.lock();
        *inner.counts.entry(collection.to_string()).or_default() += 1;
        if inner.retained.len() < self.retain_limit {
            inner.retained.push((collection.to_string(), document.clone()));
        }
        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}
