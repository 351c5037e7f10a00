use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::BoundedQueue;
use crate::metrics::Metrics;
use crate::payload::Payload;
use crate::templates::{DocumentSource, TemplateError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Successful renders, each observed once in the latency histogram.
    pub rendered: u64,
    /// Payloads that made it into the queue.
    pub published: u64,
}

/// Renders one template over and over and feeds the results into the queue.
pub struct DocumentProducer {
    source: Arc<dyn DocumentSource>,
    template: Arc<str>,
    queue: BoundedQueue<Payload>,
    metrics: Arc<Metrics>,
}

impl DocumentProducer {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        template: impl Into<Arc<str>>,
        queue: BoundedQueue<Payload>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            template: template.into(),
            queue,
            metrics,
        }
    }

    /// Run until `cancel` fires or the queue closes.
    ///
    /// Renders run on the blocking pool so a large template never stalls the
    /// insert workers. Cancellation is checked between iterations and while
    /// waiting for queue space, never in the middle of a render. A render
    /// failure ends the loop and is returned to the caller.
    pub async fn run(self, cancel: CancellationToken) -> Result<ProducerReport, TemplateError> {
        let mut report = ProducerReport::default();

        while !cancel.is_cancelled() {
            let payload = match self.render_one().await {
                Ok(payload) => payload,
                Err(e) => {
                    error!(template = %self.template, error = %e, rendered = report.rendered, "render failed");
                    return Err(e);
                }
            };
            report.rendered += 1;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                pushed = self.queue.push(payload) => match pushed {
                    Ok(()) => report.published += 1,
                    Err(_) => {
                        debug!("payload queue closed");
                        break;
                    }
                },
            }
        }

        info!(
            templates_generated = report.rendered,
            published = report.published,
            "document producer asked to quit"
        );
        Ok(report)
    }

    async fn render_one(&self) -> Result<Payload, TemplateError> {
        let source = Arc::clone(&self.source);
        let template = Arc::clone(&self.template);
        let rendered = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            source.render(&template).map(|body| (body, start.elapsed()))
        })
        .await
        .map_err(|e| TemplateError::RenderAborted {
            name: self.template.to_string(),
            reason: e.to_string(),
        })?;

        let (body, elapsed) = rendered?;
        self.metrics.observe_render(elapsed);
        Ok(Payload::from(body))
    }
}
