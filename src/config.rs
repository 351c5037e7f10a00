use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::store::StoreBackend;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub run: RunConfig,
    #[validate(nested)]
    pub templates: TemplatesConfig,
    #[validate(nested)]
    pub store: StoreConfig,
    #[validate(nested)]
    pub metrics: MetricsConfig,
    #[validate(nested)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RunConfig {
    #[validate(range(min = 1, max = 10_000))]
    pub workers: usize,
    #[validate(range(min = 1))]
    pub worker_duration_seconds: u64,
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
    #[validate(length(min = 1))]
    pub template: String,
    /// When false, workers pick up a freshly rendered payload whenever one is
    /// waiting instead of re-inserting their first document.
    pub reuse_payload: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            worker_duration_seconds: 30,
            queue_capacity: 1,
            template: "file1.template".to_string(),
            reuse_payload: true,
        }
    }
}

impl RunConfig {
    pub fn worker_budget(&self) -> Duration {
        Duration::from_secs(self.worker_duration_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TemplatesConfig {
    pub directory: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("templates") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(length(min = 1))]
    pub collection: String,
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub acquire_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub max_connections: u32,
    /// Simulated latency per insert for the memory backend. Zero only yields.
    pub insert_latency_ms: u64,
    /// Number of documents the memory backend keeps for inspection.
    pub retain_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "postgres://localhost:5432/testing".to_string(),
            collection: "one".to_string(),
            connect_timeout_ms: 1000,
            request_timeout_ms: 1000,
            acquire_timeout_ms: 1000,
            max_connections: 10,
            insert_latency_ms: 0,
            retain_limit: 0,
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[validate(url)]
    pub pushgateway_url: String,
    #[validate(length(min = 1), custom(function = "no_slash"))]
    pub job: String,
    /// Overrides the `instance` grouping label; defaults to the hostname.
    #[validate(length(min = 1), custom(function = "no_slash"))]
    pub instance: Option<String>,
    #[validate(range(min = 1))]
    pub push_timeout_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pushgateway_url: "http://localhost:9091".to_string(),
            job: "docload".to_string(),
            instance: None,
            push_timeout_seconds: 5,
        }
    }
}

fn no_slash(value: &str) -> Result<(), ValidationError> {
    if value.contains('/') {
        return Err(ValidationError::new("contains_slash"));
    }
    Ok(())
}

impl MetricsConfig {
    pub fn instance_label(&self) -> String {
        self.instance.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[validate(length(min = 1))]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info,hyper=warn,reqwest=warn,sqlx=warn".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("DOCLOAD__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.validate().context("configuration failed validation")?;
        Ok(cfg)
    }
}
