//! The worker pool and the pipeline it runs.
//!
//! The HTTP ingress enqueues raw deliveries; a fixed number of workers
//! share one queue and run each message through the [`Pipeline`]. Every
//! run ends in an [`Outcome`] that the worker logs before taking the next
//! message. No outcome, not even a panic, stops a worker.
//!
//! # Module Structure
//!
//! - [`message`]: the queued unit of work
//! - [`pool`]: workers and the shared queue
//! - [`pipeline`]: stage ordering
//! - [`expand`]: issue expansion
//! - [`visibility`]: acting-user client and comment visibility
//! - [`outcome`]: the three-way result and failure classification

mod expand;
mod message;
mod outcome;
mod pipeline;
mod pool;
mod visibility;

pub use expand::expand_issue;
pub use message::WebhookMessage;
pub use outcome::{
    DeliveryReport, Failure, FailureKind, Halt, IgnoreReason, Outcome, PipelineError,
};
pub use pipeline::Pipeline;
pub use pool::{QueueError, WebhookQueue, WorkerPool};
pub use visibility::{acting_client, resolve_visibility};
