//! A fixed pool of workers draining one shared queue.
//!
//! Every worker loops on the same receiver: take the next message, run the
//! pipeline, log the outcome, repeat. A message goes to exactly one worker.
//! No ordering holds between messages taken by different workers.
//!
//! Shutdown is implicit: once every [`WebhookQueue`] handle is dropped the
//! workers drain what is left and exit.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::message::WebhookMessage;
use super::outcome::{Failure, FailureKind, Outcome, PipelineError};
use super::pipeline::Pipeline;
use crate::jira::ClientFactory;
use crate::notify::PostingSink;
use crate::store::{InstanceStore, SubscriptionStore, UserStore};
use crate::types::InstanceId;

/// Errors returned when handing a message to the pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity (only from [`WebhookQueue::try_enqueue`]).
    #[error("webhook queue is full")]
    Full,

    /// Every worker has exited.
    #[error("webhook queue is closed")]
    Closed,
}

/// The producer side of the shared queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WebhookQueue {
    tx: mpsc::Sender<WebhookMessage>,
}

impl WebhookQueue {
    /// Hands a delivery to the pool, waiting while the queue is full.
    pub async fn enqueue(
        &self,
        instance_id: impl Into<InstanceId>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), QueueError> {
        self.tx
            .send(WebhookMessage::new(instance_id, payload))
            .await
            .map_err(|_| QueueError::Closed)
    }

    /// Hands a delivery to the pool without waiting.
    pub fn try_enqueue(
        &self,
        instance_id: impl Into<InstanceId>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), QueueError> {
        self.tx
            .try_send(WebhookMessage::new(instance_id, payload))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<WebhookMessage>>>;

/// Handles to the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` workers behind a queue holding up to `capacity`
    /// messages. Both are clamped to at least one.
    pub fn start<S, F, P>(
        workers: usize,
        capacity: usize,
        pipeline: Arc<Pipeline<S, F, P>>,
    ) -> (WebhookQueue, WorkerPool)
    where
        S: InstanceStore + UserStore + SubscriptionStore + 'static,
        F: ClientFactory + 'static,
        P: PostingSink + 'static,
    {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        info!(workers, capacity, "Starting worker pool");
        let handles = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&rx), Arc::clone(&pipeline))))
            .collect();

        (WebhookQueue { tx }, WorkerPool { handles })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop<S, F, P>(id: usize, rx: SharedReceiver, pipeline: Arc<Pipeline<S, F, P>>)
where
    S: InstanceStore + UserStore + SubscriptionStore + 'static,
    F: ClientFactory + 'static,
    P: PostingSink + 'static,
{
    debug!(worker_id = id, "Worker started");
    loop {
        let next = rx.lock().await.recv().await;
        let Some(message) = next else {
            break;
        };

        let instance_id = message.instance_id().clone();

        // A panic inside one run must not take the worker down with it.
        let run_pipeline = Arc::clone(&pipeline);
        let outcome = match tokio::spawn(async move { run_pipeline.process(&message).await }).await
        {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failed(Failure {
                kind: FailureKind::FatalToMessage,
                error: PipelineError::Aborted(e.to_string()),
            }),
        };

        log_outcome(id, &instance_id, &outcome);
    }
    debug!(worker_id = id, "Queue closed, worker exiting");
}

/// The single point where run results are logged.
fn log_outcome(worker_id: usize, instance_id: &InstanceId, outcome: &Outcome) {
    match outcome {
        Outcome::Delivered(report) => {
            debug!(
                worker_id,
                instance_id = %instance_id,
                direct = report.direct.posted.len(),
                channels = report.channels.delivered.len(),
                channel_failures = report.channels.failed.len(),
                "Webhook delivered"
            );
            if !report.direct.warnings.is_empty() || !report.channels.failed.is_empty() {
                warn!(
                    worker_id,
                    instance_id = %instance_id,
                    warnings = report.direct.warnings.len() + report.channels.failed.len(),
                    "Webhook delivered with failures"
                );
            }
        }
        Outcome::Ignored(reason) => {
            info!(worker_id, instance_id = %instance_id, reason = ?reason, "Webhook ignored");
        }
        Outcome::Failed(failure) => {
            error!(
                worker_id,
                instance_id = %instance_id,
                kind = ?failure.kind,
                error = %failure.error,
                "Error processing webhook"
            );
        }
    }
}
