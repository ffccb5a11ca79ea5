//! Resolving what a comment's audience is.
//!
//! Jira restricts comments to a role or group. The relay cannot ask Jira
//! what each Mattermost recipient may see, so it reads the comment as its
//! own author (through the author's connection) and takes the restriction
//! from the response. Subscriptions then decide whether a restricted
//! comment may reach their channel.

use tracing::debug;

use super::outcome::PipelineError;
use crate::jira::{ClientFactory, RestClient};
use crate::store::UserStore;
use crate::types::{AccountId, Instance};
use crate::webhooks::CommentRef;

/// Builds a client acting as the Mattermost user connected to `account`.
///
/// Returns `Ok(None)` when the account has no connected user or that user
/// has no stored connection: an expected situation, not a fault.
pub async fn acting_client<U, F>(
    users: &U,
    clients: &F,
    instance: &Instance,
    account: &AccountId,
) -> Result<Option<F::Client>, PipelineError>
where
    U: UserStore,
    F: ClientFactory,
{
    let user_id = match users.load_mattermost_user_id(&instance.id, account).await {
        Ok(user_id) => user_id,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let connection = match users.load_connection(&instance.id, &user_id).await {
        Ok(connection) => connection,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    debug!(account = %account, user_id = %user_id, "Acting as connected user");
    clients
        .get_client(instance, &connection)
        .map(Some)
        .map_err(|e| PipelineError::api("client setup", e))
}

/// Reads the comment's visibility restriction, empty when public.
pub async fn resolve_visibility<C: RestClient>(
    client: &C,
    comment: &CommentRef,
) -> Result<String, PipelineError> {
    let body = client
        .rest_get(&comment.self_link, &[])
        .await
        .map_err(|e| PipelineError::api("comment visibility lookup", e))?;

    let visibility = body
        .get("visibility")
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    debug!(comment = %comment.id, visibility = %visibility, "Resolved comment visibility");
    Ok(visibility)
}
