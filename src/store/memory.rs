//! An in-memory store, built in code or loaded from a JSON seed file.
//!
//! # Seed format
//!
//! ```json
//! {
//!   "instances": [{ "id": "jira", "base_url": "https://jira.example.com", "kind": "server" }],
//!   "users": [{
//!     "instance_id": "jira",
//!     "mattermost_user_id": "U1",
//!     "connection": {
//!       "account_id": "acct123",
//!       "credentials": { "type": "bearer", "token": "..." },
//!       "settings": { "notifications": true }
//!     }
//!   }],
//!   "subscriptions": [{
//!     "id": "s1", "channel_id": "C1", "name": "comments", "instance_id": "jira",
//!     "filters": { "events": ["event_created_comment"] }
//!   }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::{InstanceStore, StoreError, SubscriptionStore, UserStore};
use crate::types::{
    AccountId, Connection, Instance, InstanceId, MattermostUserId, Subscription,
};

/// One connected user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub instance_id: InstanceId,
    pub mattermost_user_id: MattermostUserId,
    pub connection: Connection,
}

/// The on-disk shape of a seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Default)]
struct StoreData {
    instances: HashMap<InstanceId, Instance>,
    user_ids: HashMap<(InstanceId, AccountId), MattermostUserId>,
    connections: HashMap<(InstanceId, MattermostUserId), Connection>,
    subscriptions: HashMap<InstanceId, Vec<Subscription>>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<StoreData>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: StoreSeed) -> Self {
        let mut store = Self::new();
        for instance in seed.instances {
            store = store.with_instance(instance);
        }
        for user in seed.users {
            store = store.with_connection(&user.instance_id, user.mattermost_user_id, user.connection);
        }
        for subscription in seed.subscriptions {
            store = store.with_subscription(subscription);
        }
        store
    }

    /// Loads a seed file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let seed: StoreSeed = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            instances = seed.instances.len(),
            users = seed.users.len(),
            subscriptions = seed.subscriptions.len(),
            "Loaded store seed"
        );
        Ok(Self::from_seed(seed))
    }

    pub fn with_instance(mut self, mut instance: Instance) -> Self {
        instance.base_url = instance.base_url.trim_end_matches('/').to_string();
        self.data
            .get_mut()
            .instances
            .insert(instance.id.clone(), instance);
        self
    }

    /// Connects a Mattermost user, indexing them by their Jira account.
    pub fn with_connection(
        mut self,
        instance_id: &InstanceId,
        user_id: impl Into<MattermostUserId>,
        connection: Connection,
    ) -> Self {
        let user_id = user_id.into();
        let data = self.data.get_mut();
        data.user_ids.insert(
            (instance_id.clone(), connection.account_id.clone()),
            user_id.clone(),
        );
        data.connections
            .insert((instance_id.clone(), user_id), connection);
        self
    }

    /// Maps an account to a user without storing a connection.
    pub fn with_user_mapping(
        mut self,
        instance_id: &InstanceId,
        account_id: impl Into<AccountId>,
        user_id: impl Into<MattermostUserId>,
    ) -> Self {
        self.data
            .get_mut()
            .user_ids
            .insert((instance_id.clone(), account_id.into()), user_id.into());
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.data
            .get_mut()
            .subscriptions
            .entry(subscription.instance_id.clone())
            .or_default()
            .push(subscription);
        self
    }
}

impl InstanceStore for InMemoryStore {
    async fn load_instance(&self, instance_id: &InstanceId) -> Result<Instance, StoreError> {
        self.data
            .read()
            .await
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("instance", instance_id))
    }
}

impl UserStore for InMemoryStore {
    async fn load_mattermost_user_id(
        &self,
        instance_id: &InstanceId,
        account_id: &AccountId,
    ) -> Result<MattermostUserId, StoreError> {
        self.data
            .read()
            .await
            .user_ids
            .get(&(instance_id.clone(), account_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("user for account", account_id))
    }

    async fn load_connection(
        &self,
        instance_id: &InstanceId,
        user_id: &MattermostUserId,
    ) -> Result<Connection, StoreError> {
        self.data
            .read()
            .await
            .connections
            .get(&(instance_id.clone(), user_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found("connection", user_id))
    }
}

impl SubscriptionStore for InMemoryStore {
    async fn load_subscriptions(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .subscriptions
            .get(instance_id)
            .cloned()
            .unwrap_or_default())
    }
}
