//! Posting through the Mattermost REST API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{PostError, PostingSink};
use crate::jira::truncate_for_error;
use crate::types::{ChannelId, Instance, MattermostUserId, PostId};
use crate::webhooks::{Event, render};

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Posts as the bot account identified by `token`.
#[derive(Clone)]
pub struct MattermostPoster {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MattermostPoster {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<Created, PostError> {
        let response = self
            .http
            .post(format!("{}/api/v4/{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PostError::Status {
                status: status.as_u16(),
                message: truncate_for_error(&text, 200),
            });
        }
        Ok(response.json::<Created>().await?)
    }

    async fn create_post(&self, channel_id: &str, message: &str) -> Result<PostId, PostError> {
        let created = self
            .post_json("posts", json!({ "channel_id": channel_id, "message": message }))
            .await?;
        Ok(PostId::new(created.id))
    }
}

impl PostingSink for MattermostPoster {
    async fn post_direct(
        &self,
        bot_user_id: &MattermostUserId,
        user_id: &MattermostUserId,
        message: &str,
    ) -> Result<PostId, PostError> {
        let channel = self
            .post_json("channels/direct", json!([bot_user_id, user_id]))
            .await?;
        self.create_post(&channel.id, message).await
    }

    async fn post_to_channel(
        &self,
        event: &Event,
        instance: &Instance,
        channel_id: &ChannelId,
        _bot_user_id: &MattermostUserId,
        channel_name: &str,
    ) -> Result<PostId, PostError> {
        debug!(channel_id = %channel_id, channel_name, "Posting event to channel");
        let message = render::channel_message(event, instance);
        self.create_post(channel_id.as_str(), &message).await
    }
}

impl std::fmt::Debug for MattermostPoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostPoster")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
