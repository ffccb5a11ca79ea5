//! Shared test fakes, fixtures and arbitrary generators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use serde_json::Value;

use crate::jira::{ApiError, ClientFactory, RestClient};
use crate::notify::{PostError, PostingSink};
use crate::types::{
    ChannelId, Connection, ConnectionSettings, Credentials, Instance, InstanceId, InstanceKind,
    MattermostUserId, PostId, Subscription, SubscriptionFilters,
};
use crate::webhooks::{Event, EventFlag, render};

// ─── Fixtures ───

pub const JIRA: &str = "jira";
pub const BOT: &str = "bot-user";
pub const BASE_URL: &str = "https://jira.example.com";
pub const COMMENT_SELF: &str = "https://jira.example.com/rest/api/2/issue/10001/comment/20000";

pub fn jira_id() -> InstanceId {
    InstanceId::new(JIRA)
}

pub fn instance() -> Instance {
    Instance::new(JIRA, BASE_URL, InstanceKind::Cloud)
}

pub fn connection(account: &str) -> Connection {
    Connection {
        account_id: account.into(),
        display_name: account.to_string(),
        credentials: Credentials::Bearer {
            token: format!("token-{}", account),
        },
        settings: ConnectionSettings::enabled(),
    }
}

pub fn subscription(channel: &str, flags: &[EventFlag]) -> Subscription {
    Subscription {
        id: format!("sub-{}", channel),
        channel_id: ChannelId::new(channel),
        name: format!("{} subscription", channel),
        instance_id: jira_id(),
        filters: SubscriptionFilters {
            events: flags.iter().copied().collect(),
            ..SubscriptionFilters::default()
        },
    }
}

/// A Jira Cloud `comment_created` delivery: the issue carries only its key.
pub fn comment_created_payload(issue_key: &str, author: &str, body: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "webhookEvent": "comment_created",
        "timestamp": 1700000000000i64,
        "comment": {
            "id": "20000",
            "self": COMMENT_SELF,
            "body": body,
            "author": { "accountId": author, "displayName": author }
        },
        "issue": { "id": "10001", "key": issue_key }
    }))
    .unwrap()
}

/// The body Jira returns for `GET 2/issue/<key>`.
pub fn issue_response(issue_key: &str) -> Value {
    serde_json::json!({
        "id": "10001",
        "key": issue_key,
        "self": format!("{}/rest/api/2/issue/10001", BASE_URL),
        "fields": {
            "summary": "Fix the widget",
            "project": { "id": "100", "key": "PROJ", "name": "Project" },
            "issuetype": { "id": "1", "name": "Bug" },
            "status": { "name": "Open" },
            "labels": ["backend"]
        }
    })
}

/// The body Jira returns for a comment, optionally restricted.
pub fn comment_response(visibility: Option<&str>) -> Value {
    let mut body = serde_json::json!({
        "id": "20000",
        "self": COMMENT_SELF,
        "body": "hello"
    });
    if let Some(value) = visibility {
        body["visibility"] = serde_json::json!({ "type": "role", "value": value });
    }
    body
}

// ─── Posting sink ───

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Direct {
        user: MattermostUserId,
        message: String,
    },
    Channel {
        channel: ChannelId,
        message: String,
    },
}

/// Records every post; selected channels and users fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
    failing_channels: HashSet<ChannelId>,
    failing_users: HashSet<MattermostUserId>,
    panic_next: AtomicBool,
    next_id: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_channel(mut self, channel: &str) -> Self {
        self.failing_channels.insert(ChannelId::new(channel));
        self
    }

    pub fn failing_user(mut self, user: &str) -> Self {
        self.failing_users.insert(MattermostUserId::new(user));
        self
    }

    /// The next channel post panics instead of returning.
    pub fn panicking_once(self) -> Self {
        self.panic_next.store(true, Ordering::SeqCst);
        self
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn channel_posts(&self) -> Vec<ChannelId> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Channel { channel, .. } => Some(channel),
                Delivery::Direct { .. } => None,
            })
            .collect()
    }

    pub fn direct_posts(&self) -> Vec<MattermostUserId> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Direct { user, .. } => Some(user),
                Delivery::Channel { .. } => None,
            })
            .collect()
    }

    fn record(&self, delivery: Delivery) -> PostId {
        self.deliveries.lock().unwrap().push(delivery);
        PostId::new(format!("post-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

impl PostingSink for RecordingSink {
    async fn post_direct(
        &self,
        _bot_user_id: &MattermostUserId,
        user_id: &MattermostUserId,
        message: &str,
    ) -> Result<PostId, PostError> {
        if self.failing_users.contains(user_id) {
            return Err(PostError::Other(format!("user {} unreachable", user_id)));
        }
        Ok(self.record(Delivery::Direct {
            user: user_id.clone(),
            message: message.to_string(),
        }))
    }

    async fn post_to_channel(
        &self,
        event: &Event,
        instance: &Instance,
        channel_id: &ChannelId,
        _bot_user_id: &MattermostUserId,
        _channel_name: &str,
    ) -> Result<PostId, PostError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("sink blew up posting to {}", channel_id);
        }
        if self.failing_channels.contains(channel_id) {
            return Err(PostError::Status {
                status: 500,
                message: format!("channel {} unavailable", channel_id),
            });
        }
        Ok(self.record(Delivery::Channel {
            channel: channel_id.clone(),
            message: render::channel_message(event, instance),
        }))
    }
}

// ─── Jira client ───

/// A canned response for one path.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    Network,
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, Reply>,
    requests: Vec<String>,
}

/// Answers GETs from a script and records every requested path.
///
/// Unscripted paths answer 404. Clones share the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, path: impl Into<String>, reply: Reply) -> Self {
        self.script.lock().unwrap().replies.insert(path.into(), reply);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.script.lock().unwrap().requests.clone()
    }
}

impl RestClient for ScriptedClient {
    async fn rest_get(&self, path: &str, _query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(path.to_string());
        match script.replies.get(path) {
            Some(Reply::Json(body)) => Ok(body.clone()),
            Some(Reply::Status(status)) => Err(ApiError::from_status(*status, "scripted")),
            Some(Reply::Network) => Err(ApiError::transient("connection reset")),
            None => Err(ApiError::from_status(404, path)),
        }
    }
}

/// Hands out one shared [`ScriptedClient`] and counts requests for it.
#[derive(Debug, Default)]
pub struct CountingFactory {
    client: ScriptedClient,
    calls: AtomicUsize,
    deny: bool,
}

impl CountingFactory {
    pub fn new(client: ScriptedClient) -> Self {
        CountingFactory {
            client,
            calls: AtomicUsize::new(0),
            deny: false,
        }
    }

    /// Every `get_client` call fails as unauthorized.
    pub fn denying() -> Self {
        CountingFactory {
            deny: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> &ScriptedClient {
        &self.client
    }
}

impl ClientFactory for CountingFactory {
    type Client = ScriptedClient;

    fn get_client(
        &self,
        _instance: &Instance,
        connection: &Connection,
    ) -> Result<ScriptedClient, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny || connection.credentials.is_empty() {
            return Err(ApiError::permission_denied("scripted denial"));
        }
        Ok(self.client.clone())
    }
}

// ─── Generators ───

pub fn arb_event_flag() -> impl Strategy<Value = EventFlag> {
    prop::sample::select(vec![
        EventFlag::Created,
        EventFlag::Deleted,
        EventFlag::DeletedUnresolved,
        EventFlag::CreatedComment,
        EventFlag::UpdatedComment,
        EventFlag::DeletedComment,
        EventFlag::UpdatedAssignee,
        EventFlag::UpdatedLabels,
        EventFlag::UpdatedStatus,
        EventFlag::Resolved,
        EventFlag::Reopened,
        EventFlag::UpdatedAny,
    ])
}

pub fn arb_visibility() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("Administrators".to_string()),
        Just("Developers".to_string()),
        "[A-Za-z ]{1,16}",
    ]
}
