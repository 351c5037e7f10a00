//! Producer → bounded queue → insert workers, supervised by the coordinator.

pub mod coordinator;
pub mod producer;
pub mod queue;
pub mod worker;

pub use coordinator::{RunSettings, RunSummary, ShutdownCoordinator};
pub use producer::{DocumentProducer, ProducerReport};
pub use queue::{BoundedQueue, QueueClosed};
pub use worker::{InsertWorker, WorkerOutcome, WorkerReport};
