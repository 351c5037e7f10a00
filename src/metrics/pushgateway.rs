use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

use super::{ExportError, Metrics, MetricsSink};
use crate::config::MetricsConfig;

/// Pushes the registry to a Prometheus Pushgateway under
/// `/metrics/job/<job>/instance/<instance>`.
///
/// Uses `POST`, which replaces only the metrics with the same names in the
/// grouping and leaves anything else pushed there untouched.
#[derive(Clone)]
pub struct PushGateway {
    client: reqwest::Client,
    url: Url,
}

impl PushGateway {
    pub fn new(base_url: &str, job: &str, instance: &str, timeout: Duration) -> Result<Self, ExportError> {
        let invalid = |reason: &str| ExportError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        for (label, value) in [("job", job), ("instance", instance)] {
            if value.is_empty() || value.contains('/') {
                return Err(ExportError::InvalidLabel {
                    label,
                    value: value.to_string(),
                });
            }
        }

        let mut url = Url::parse(base_url).map_err(|e| invalid(&e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base url"))?
            .pop_if_empty()
            .extend(["metrics", "job", job, "instance", instance]);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }

    pub fn from_config(cfg: &MetricsConfig) -> Result<Self, ExportError> {
        Self::new(
            &cfg.pushgateway_url,
            &cfg.job,
            &cfg.instance_label(),
            Duration::from_secs(cfg.push_timeout_seconds),
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl MetricsSink for PushGateway {
    async fn export(&self, metrics: &Metrics) -> Result<(), ExportError> {
        let body = metrics.encode_text()?;
        debug!(url = %self.url, bytes = body.len(), "pushing metrics");

        let resp = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT))
            .header(USER_AGENT, HeaderValue::from_static("docload/0.1"))
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
