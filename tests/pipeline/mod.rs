mod run_test;
mod shutdown_test;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docload::metrics::{ExportError, Metrics, MetricsSink};
use docload::pipeline::RunSettings;
use docload::templates::{DocumentSource, TemplateError};

pub const TEMPLATE: &str = "t.template";

pub fn settings(workers: usize, budget: Duration) -> RunSettings {
    RunSettings {
        workers,
        worker_budget: budget,
        queue_capacity: 1,
        template: TEMPLATE.to_string(),
        collection: "one".to_string(),
        reuse_payload: true,
    }
}

/// Scripted source: call numbers listed in `malformed` render invalid JSON,
/// call `fail_at` returns a render error, everything else is `{"n": <call>}`.
pub struct ScriptedSource {
    calls: Mutex<u64>,
    malformed: Vec<u64>,
    fail_at: Option<u64>,
}

impl ScriptedSource {
    pub fn healthy() -> Arc<Self> {
        Self::new(Vec::new(), None)
    }

    pub fn new(malformed: Vec<u64>, fail_at: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
            malformed,
            fail_at,
        })
    }

    pub fn calls(&self) -> u64 {
        *self.calls.lock()
    }
}

impl DocumentSource for ScriptedSource {
    fn render(&self, name: &str) -> Result<String, TemplateError> {
        let mut calls = self.calls.lock();
        *calls += 1;
        let call = *calls;
        if Some(call) == self.fail_at {
            return Err(TemplateError::Render {
                name: name.to_string(),
                source: minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "no such variable"),
            });
        }
        if self.malformed.contains(&call) {
            return Ok("{ \"n\": ".to_string());
        }
        Ok(format!("{{\"n\": {call}}}"))
    }
}

/// Takes `delay` of wall time for every render.
pub struct SlowSource {
    pub delay: Duration,
}

impl DocumentSource for SlowSource {
    fn render(&self, _name: &str) -> Result<String, TemplateError> {
        std::thread::sleep(self.delay);
        Ok(r#"{"slow": true}"#.to_string())
    }
}

/// Records how many times it was asked to export.
#[derive(Default)]
pub struct CountingSink {
    exports: AtomicUsize,
}

impl CountingSink {
    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSink for CountingSink {
    async fn export(&self, _metrics: &Metrics) -> Result<(), ExportError> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
