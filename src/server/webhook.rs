//! Webhook endpoint handler.
//!
//! Authenticates Jira webhook deliveries and hands them to the worker pool
//! before returning 202 Accepted. Parsing and delivery happen on the
//! workers; a payload Jira sends us is never inspected here beyond its
//! signature.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::types::InstanceId;
use crate::webhooks::{SIGNATURE_HEADER, authenticate};
use crate::worker::QueueError;

/// Query parameters Jira appends to the configured webhook URL.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub instance_id: Option<String>,
    pub secret: Option<String>,
}

/// Errors that can occur when accepting a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The URL did not name an instance.
    #[error("missing instance_id query parameter")]
    MissingInstanceId,

    /// Neither the signature nor the query secret checked out.
    #[error("invalid webhook secret")]
    Unauthorized,

    /// The worker pool is gone.
    #[error("webhook queue is closed")]
    QueueClosed,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingInstanceId => StatusCode::BAD_REQUEST,
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Query: `instance_id` (required), `secret` (when the webhook URL embeds it)
/// - Header: `X-Hub-Signature: sha256=<hex>` (when Jira signs the body)
/// - Body: the Jira webhook payload
///
/// # Response
///
/// - 202 Accepted: handed to the worker pool
/// - 400 Bad Request: no instance id
/// - 401 Unauthorized: neither secret check passed
/// - 503 Service Unavailable: the pool has shut down
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    // Authenticate before anything else is looked at.
    if !authenticate(
        &body,
        signature,
        query.secret.as_deref(),
        app_state.webhook_secret(),
    ) {
        warn!(
            has_signature = signature.is_some(),
            has_query_secret = query.secret.is_some(),
            "Rejected webhook with invalid secret"
        );
        return Err(WebhookError::Unauthorized);
    }

    let instance_id = query
        .instance_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(InstanceId::new)
        .ok_or(WebhookError::MissingInstanceId)?;

    debug!(instance_id = %instance_id, bytes = body.len(), "Received webhook");

    match app_state.queue().enqueue(instance_id, body.to_vec()).await {
        Ok(()) => Ok((StatusCode::ACCEPTED, "Accepted")),
        Err(QueueError::Closed) | Err(QueueError::Full) => {
            warn!("Worker pool is not accepting webhooks");
            Err(WebhookError::QueueClosed)
        }
    }
}
