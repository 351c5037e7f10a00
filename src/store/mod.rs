//! Document store seam used by the insert workers.
//!
//! A single client is built at startup and shared by every worker through an
//! `Arc<dyn DocumentStore>`, so implementations must tolerate overlapping
//! concurrent inserts. The PostgreSQL backend gets this from its `sqlx` pool;
//! the memory backend serialises through a mutex.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::StoreConfig;

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use pg::PgDocumentStore;

/// Store-native record: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),
    #[error("insert into '{collection}' failed: {reason}")]
    Insert { collection: String, reason: String },
    #[error("insert into '{0}' timed out")]
    InsertTimeout(String),
    #[error("store backend '{0}' is not available in this build (enable the `db` feature)")]
    BackendUnavailable(StoreBackend),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one record into the named collection.
    async fn insert_one(&self, collection: &str, document: &Document) -> Result<(), StoreError>;

    fn backend(&self) -> StoreBackend;
}

/// Build the configured store client once; callers share the returned handle.
pub async fn connect(cfg: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match cfg.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::from_config(cfg)),
        #[cfg(feature = "db")]
        StoreBackend::Postgres => Arc::new(PgDocumentStore::connect(cfg).await?),
        #[cfg(not(feature = "db"))]
        StoreBackend::Postgres => return Err(StoreError::BackendUnavailable(StoreBackend::Postgres)),
    };
    info!(backend = %cfg.backend, collection = %cfg.collection, "document store ready");
    Ok(store)
}
