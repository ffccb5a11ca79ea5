//! Read-only access to instances, user connections and subscriptions.
//!
//! The relay never writes to these stores. Every read is independent, so
//! any number of workers may share one store.

use std::future::Future;

use thiserror::Error;

use crate::types::{
    AccountId, Connection, Instance, InstanceId, MattermostUserId, Subscription,
};
use crate::webhooks::Event;

mod memory;

pub use memory::{InMemoryStore, StoreSeed, UserRecord};

/// Errors that can occur when reading a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// IO error reading a seed file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed seed file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(what: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            what,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub trait InstanceStore: Send + Sync {
    fn load_instance(
        &self,
        instance_id: &InstanceId,
    ) -> impl Future<Output = Result<Instance, StoreError>> + Send;
}

pub trait UserStore: Send + Sync {
    /// Maps a Jira account to the Mattermost user connected as it.
    fn load_mattermost_user_id(
        &self,
        instance_id: &InstanceId,
        account_id: &AccountId,
    ) -> impl Future<Output = Result<MattermostUserId, StoreError>> + Send;

    fn load_connection(
        &self,
        instance_id: &InstanceId,
        user_id: &MattermostUserId,
    ) -> impl Future<Output = Result<Connection, StoreError>> + Send;
}

pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions stored for an instance. None is an empty list.
    fn load_subscriptions(
        &self,
        instance_id: &InstanceId,
    ) -> impl Future<Output = Result<Vec<Subscription>, StoreError>> + Send;

    /// The subscriptions whose filters accept `event` at `visibility`.
    fn get_channels_subscribed(
        &self,
        event: &Event,
        instance_id: &InstanceId,
        visibility: &str,
    ) -> impl Future<Output = Result<Vec<Subscription>, StoreError>> + Send {
        async move {
            let subscriptions = self.load_subscriptions(instance_id).await?;
            Ok(subscriptions
                .into_iter()
                .filter(|sub| sub.matches(event, visibility))
                .collect())
        }
    }
}
