//! Render latency histogram and insert counters.
//!
//! The collectors live in a private `prometheus::Registry` owned by one
//! [`Metrics`] value that is shared by `Arc` between the producer and the
//! workers. Every update is an atomic operation on the collector, so nothing
//! is lost under concurrent writers.

use async_trait::async_trait;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::time::Duration;
use thiserror::Error;

pub mod pushgateway;

pub use pushgateway::PushGateway;

pub const NAMESPACE: &str = "docload";

/// Render latency buckets, in seconds.
pub const RENDER_LATENCY_BUCKETS: [f64; 10] = [0.01, 0.02, 0.03, 0.04, 0.05, 0.10, 0.20, 0.30, 0.40, 1.0];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("invalid push gateway url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("grouping label {label}='{value}' must be non-empty and must not contain '/'")]
    InvalidLabel { label: &'static str, value: String },
    #[error("push gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push gateway rejected metrics: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    render_latency: Histogram,
    requests: IntCounter,
    insert_errors: IntCounter,
}

/// Point-in-time view of the collectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub render_count: u64,
    pub render_sum_seconds: f64,
    pub requests: u64,
    pub insert_errors: u64,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let render_latency = Histogram::with_opts(
            HistogramOpts::new("render_latency", "Time spent rendering one document template, in seconds")
                .namespace(NAMESPACE)
                .buckets(RENDER_LATENCY_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(render_latency.clone()))?;

        let requests = IntCounter::with_opts(
            Opts::new("request_count_total", "Insert operations issued against the store").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(requests.clone()))?;

        let insert_errors = IntCounter::with_opts(
            Opts::new("insert_errors_total", "Insert operations the store reported as failed").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(insert_errors.clone()))?;

        Ok(Self {
            registry,
            render_latency,
            requests,
            insert_errors,
        })
    }

    pub fn observe_render(&self, elapsed: Duration) {
        self.render_latency.observe(elapsed.as_secs_f64());
    }

    pub fn inc_requests(&self) {
        self.requests.inc();
    }

    pub fn inc_insert_errors(&self) {
        self.insert_errors.inc();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            render_count: self.render_latency.get_sample_count(),
            render_sum_seconds: self.render_latency.get_sample_sum(),
            requests: self.requests.get(),
            insert_errors: self.insert_errors.get(),
        }
    }

    /// Encode every collector in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<Vec<u8>, ExportError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(buf)
    }
}

/// Destination for the end-of-run metrics flush.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn export(&self, metrics: &Metrics) -> Result<(), ExportError>;
}

/// Sink used when pushing is disabled.
pub struct NoopSink;

#[async_trait]
impl MetricsSink for NoopSink {
    async fn export(&self, _metrics: &Metrics) -> Result<(), ExportError> {
        Ok(())
    }
}
