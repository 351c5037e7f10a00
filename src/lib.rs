pub mod config;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod pipeline;
pub mod store;
pub mod telemetry;
pub mod templates;

pub use error::HarnessError;
