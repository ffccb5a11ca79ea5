//! Delivery of rendered events to Mattermost.
//!
//! Two independent paths:
//!
//! - **Direct messages** to the people an event concerns (assignee,
//!   mentioned users, reporter, watchers), gated by each recipient's own
//!   notification settings.
//! - **Channel fan-out** to every subscribed channel.
//!
//! Every delivery attempt is isolated: a failure is logged and recorded in
//! the report, and the remaining deliveries still go ahead.

use std::collections::BTreeSet;
use std::future::Future;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::store::UserStore;
use crate::types::{ChannelId, Instance, MattermostUserId, PostId, Subscription};
use crate::webhooks::{Event, render};

mod mattermost;

pub use mattermost::MattermostPoster;

/// Errors from the posting sink.
#[derive(Debug, Error)]
pub enum PostError {
    /// The request never got an answer.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Mattermost answered with an error status.
    #[error("Mattermost returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Anything else, typically from test sinks.
    #[error("{0}")]
    Other(String),
}

/// Where rendered messages go.
pub trait PostingSink: Send + Sync {
    /// Sends `message` from the bot to `user` in their direct channel.
    fn post_direct(
        &self,
        bot_user_id: &MattermostUserId,
        user_id: &MattermostUserId,
        message: &str,
    ) -> impl Future<Output = Result<PostId, PostError>> + Send;

    /// Renders `event` and posts it to a subscribed channel.
    fn post_to_channel(
        &self,
        event: &Event,
        instance: &Instance,
        channel_id: &ChannelId,
        bot_user_id: &MattermostUserId,
        channel_name: &str,
    ) -> impl Future<Output = Result<PostId, PostError>> + Send;
}

/// What the direct-message path did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectReport {
    pub posted: Vec<PostId>,
    pub warnings: Vec<String>,
}

/// What channel fan-out did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub delivered: Vec<(ChannelId, PostId)>,
    pub failed: Vec<(ChannelId, String)>,
}

impl ChannelReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Sends the event's direct messages.
///
/// Recipients without a connection, or whose settings turn the role off,
/// are skipped silently. Lookup and posting failures become warnings.
#[instrument(skip_all, fields(instance_id = %instance.id, issue = %event.issue.key))]
pub async fn post_notifications<U, P>(
    users: &U,
    poster: &P,
    bot_user_id: &MattermostUserId,
    event: &Event,
    instance: &Instance,
) -> DirectReport
where
    U: UserStore,
    P: PostingSink,
{
    let mut report = DirectReport::default();

    for notification in &event.notifications {
        let account = &notification.recipient.account_id;

        let user_id = match users.load_mattermost_user_id(&instance.id, account).await {
            Ok(user_id) => user_id,
            Err(e) if e.is_not_found() => {
                debug!(account = %account, "Recipient not connected, skipping");
                continue;
            }
            Err(e) => {
                warn!(account = %account, error = %e, "Failed to look up recipient");
                report.warnings.push(format!("{}: {}", account, e));
                continue;
            }
        };

        let connection = match users.load_connection(&instance.id, &user_id).await {
            Ok(connection) => connection,
            Err(e) if e.is_not_found() => {
                debug!(user_id = %user_id, "Recipient has no connection, skipping");
                continue;
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to load recipient connection");
                report.warnings.push(format!("{}: {}", user_id, e));
                continue;
            }
        };

        if !connection.settings.should_receive(notification.role) {
            debug!(user_id = %user_id, role = %notification.role, "Role muted by settings");
            continue;
        }

        let message = render::direct_message(event, instance, notification.role);
        match poster.post_direct(bot_user_id, &user_id, &message).await {
            Ok(post_id) => {
                debug!(user_id = %user_id, role = %notification.role, post_id = %post_id, "Sent direct message");
                report.posted.push(post_id);
            }
            Err(e) => {
                warn!(user_id = %user_id, role = %notification.role, error = %e, "Failed to send direct message");
                report.warnings.push(format!("{}: {}", user_id, e));
            }
        }
    }

    report
}

/// Posts the event once to each distinct subscribed channel.
#[instrument(skip_all, fields(instance_id = %instance.id, issue = %event.issue.key))]
pub async fn post_to_channels<P>(
    poster: &P,
    bot_user_id: &MattermostUserId,
    event: &Event,
    instance: &Instance,
    subscriptions: &[Subscription],
) -> ChannelReport
where
    P: PostingSink,
{
    let mut report = ChannelReport::default();
    let mut seen: BTreeSet<&ChannelId> = BTreeSet::new();

    for subscription in subscriptions {
        let channel_id = &subscription.channel_id;
        if !seen.insert(channel_id) {
            continue;
        }

        match poster
            .post_to_channel(event, instance, channel_id, bot_user_id, &subscription.name)
            .await
        {
            Ok(post_id) => {
                debug!(channel_id = %channel_id, post_id = %post_id, "Posted to channel");
                report.delivered.push((channel_id.clone(), post_id));
            }
            Err(e) => {
                warn!(
                    channel_id = %channel_id,
                    subscription = %subscription.name,
                    error = %e,
                    "Failed to post to channel"
                );
                report.failed.push((channel_id.clone(), e.to_string()));
            }
        }
    }

    report
}
