use thiserror::Error;

use crate::metrics::ExportError;
use crate::store::StoreError;
use crate::templates::TemplateError;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("template bootstrap failed: {0}")]
    Templates(#[source] TemplateError),

    #[error("store bootstrap failed: {0}")]
    Store(#[from] StoreError),

    #[error("metrics setup failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("metrics sink setup failed: {0}")]
    Sink(#[from] ExportError),

    #[error("document producer failed: {0}")]
    Render(#[source] TemplateError),

    #[error("document producer panicked: {0}")]
    ProducerPanicked(String),
}
