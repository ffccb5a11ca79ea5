//! The per-message processing pipeline.
//!
//! ```text
//! Parse ─▶ Load instance ─▶ Direct messages ─▶ Acting client ─▶ Expand
//!       ─▶ Visibility (comments) ─▶ Match ─▶ Channel fan-out
//! ```
//!
//! Stages run strictly in this order on the worker that dequeued the
//! message. Nothing outlives the run.
//!
//! Only comment events require the acting client. Other events use it to
//! expand the issue when they can, and otherwise match on whatever the
//! payload carried. Deleted issues are never fetched.

use tracing::{debug, instrument, warn};

use super::expand::expand_issue;
use super::message::WebhookMessage;
use super::outcome::{DeliveryReport, Halt, IgnoreReason, Outcome, PipelineError};
use super::visibility::{acting_client, resolve_visibility};
use crate::jira::ClientFactory;
use crate::notify::{self, PostingSink};
use crate::store::{InstanceStore, SubscriptionStore, UserStore};
use crate::types::MattermostUserId;
use crate::webhooks::{EventKind, parse_webhook};

/// Everything a worker needs to process a message.
///
/// Shared read-only between workers.
pub struct Pipeline<S, F, P> {
    store: S,
    clients: F,
    poster: P,
    bot_user_id: MattermostUserId,
}

impl<S, F, P> Pipeline<S, F, P>
where
    S: InstanceStore + UserStore + SubscriptionStore,
    F: ClientFactory,
    P: PostingSink,
{
    pub fn new(store: S, clients: F, poster: P, bot_user_id: impl Into<MattermostUserId>) -> Self {
        Pipeline {
            store,
            clients,
            poster,
            bot_user_id: bot_user_id.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clients(&self) -> &F {
        &self.clients
    }

    pub fn poster(&self) -> &P {
        &self.poster
    }

    /// Runs one message through every stage.
    pub async fn process(&self, message: &WebhookMessage) -> Outcome {
        Outcome::from(self.run(message).await)
    }

    #[instrument(skip_all, fields(instance_id = %message.instance_id()))]
    async fn run(&self, message: &WebhookMessage) -> Result<DeliveryReport, Halt> {
        let Some(mut event) = parse_webhook(message.payload())? else {
            return Err(Halt::Ignore(IgnoreReason::NotActionable));
        };
        debug!(event_kind = %event.kind, issue = %event.issue.key, "Parsed webhook");

        let instance = match self.store.load_instance(message.instance_id()).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                return Err(Halt::Ignore(IgnoreReason::InstanceNotInstalled(
                    message.instance_id().clone(),
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // Direct messages never block channel fan-out.
        let direct = notify::post_notifications(
            &self.store,
            &self.poster,
            &self.bot_user_id,
            &event,
            &instance,
        )
        .await;

        let is_comment = event.is_comment_event();
        // A deleted issue can no longer be fetched.
        let wants_expansion =
            event.issue.needs_expansion() && event.kind != EventKind::IssueDeleted;
        let acting_account = event.acting_account().cloned();
        let client = match &acting_account {
            Some(account) if is_comment => {
                acting_client(&self.store, &self.clients, &instance, account).await?
            }
            Some(account) if wants_expansion => {
                match acting_client(&self.store, &self.clients, &instance, account).await {
                    Ok(client) => client,
                    Err(e @ PipelineError::Api { .. }) => {
                        warn!(account = %account, error = %e, "Cannot act as the actor");
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ => None,
        };

        if is_comment && client.is_none() {
            let account = acting_account.unwrap_or_default();
            return Err(Halt::Ignore(IgnoreReason::AuthorNotConnected(account)));
        }

        match &client {
            Some(client) if wants_expansion => {
                expand_issue(client, &mut event.issue).await?;
            }
            _ if event.issue.needs_expansion() => {
                debug!(issue = %event.issue.key, "Matching on payload fields");
            }
            _ => {}
        }

        let visibility = match (&client, &event.comment) {
            (Some(client), Some(comment)) if is_comment => {
                resolve_visibility(client, comment).await?
            }
            _ => String::new(),
        };

        let subscriptions = self
            .store
            .get_channels_subscribed(&event, &instance.id, &visibility)
            .await?;
        debug!(
            matched = subscriptions.len(),
            visibility = %visibility,
            "Matched subscriptions"
        );

        let channels = notify::post_to_channels(
            &self.poster,
            &self.bot_user_id,
            &event,
            &instance,
            &subscriptions,
        )
        .await;

        Ok(DeliveryReport {
            direct,
            channels,
            visibility,
        })
    }
}
