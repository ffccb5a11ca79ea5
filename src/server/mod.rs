//! HTTP ingress for the relay.
//!
//! This module implements the HTTP server that:
//! - Accepts Jira webhook deliveries, authenticates them, and hands them to
//!   the worker pool
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook?instance_id=<id>[&secret=<s>]` - Accepts a Jira webhook
//!   delivery (returns 202 Accepted)
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

use crate::worker::WebhookQueue;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Producer side of the worker pool's queue.
    queue: WebhookQueue,

    /// Shared secret checked against the signature header or `secret` query
    /// parameter.
    webhook_secret: String,
}

impl AppState {
    pub fn new(queue: WebhookQueue, webhook_secret: impl Into<String>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                queue,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn queue(&self) -> &WebhookQueue {
        &self.inner.queue
    }

    pub fn webhook_secret(&self) -> &str {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
