#![cfg(feature = "db")]
//! PostgreSQL document store.
//!
//! Documents land in a single `documents` table as JSONB, keyed by collection
//! name, so the collection never has to be interpolated into SQL.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::{Document, DocumentStore, StoreBackend, StoreError};
use crate::config::StoreConfig;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id BIGSERIAL PRIMARY KEY,
        collection TEXT NOT NULL,
        body JSONB NOT NULL,
        inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const INSERT_DOCUMENT: &str = "INSERT INTO documents (collection, body) VALUES ($1, $2)";

pub struct PgDocumentStore {
    pool: PgPool,
    request_timeout: Duration,
}

impl PgDocumentStore {
    pub async fn connect(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let connect_err = |reason: String| StoreError::Connect {
            url: redact(&cfg.url),
            reason,
        };

        let options = PgConnectOptions::from_str(&cfg.url)
            .map_err(|e| connect_err(e.to_string()))?
            .options([("statement_timeout", format!("{}ms", cfg.request_timeout_ms))]);

        let pool = tokio::time::timeout(
            cfg.connect_timeout(),
            PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .acquire_timeout(cfg.acquire_timeout())
                .connect_with(options),
        )
        .await
        .map_err(|_| StoreError::ConnectTimeout(redact(&cfg.url)))?
        .map_err(|e| connect_err(e.to_string()))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        info!(max_connections = cfg.max_connections, "connected to PostgreSQL");
        Ok(Self {
            pool,
            request_timeout: cfg.request_timeout(),
        })
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_one(&self, collection: &str, document: &Document) -> Result<(), StoreError> {
        let insert = sqlx::query(INSERT_DOCUMENT)
            .bind(collection)
            .bind(Json(document))
            .execute(&self.pool);

        tokio::time::timeout(self.request_timeout, insert)
            .await
            .map_err(|_| StoreError::InsertTimeout(collection.to_string()))?
            .map_err(|e| StoreError::Insert {
                collection: collection.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Postgres
    }
}

/// Strip credentials from a connection URL before it reaches the logs.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
