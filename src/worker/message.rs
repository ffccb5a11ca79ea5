//! The unit of work handed from the HTTP ingress to the worker pool.

use crate::types::InstanceId;

/// A raw webhook delivery for one instance.
///
/// Immutable once built: workers only ever read it, and it is dropped as
/// soon as its pipeline run ends.
#[derive(Debug, Clone)]
pub struct WebhookMessage {
    instance_id: InstanceId,
    payload: Vec<u8>,
}

impl WebhookMessage {
    pub fn new(instance_id: impl Into<InstanceId>, payload: impl Into<Vec<u8>>) -> Self {
        WebhookMessage {
            instance_id: instance_id.into(),
            payload: payload.into(),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// The request body exactly as received.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
