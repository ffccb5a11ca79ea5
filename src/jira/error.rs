//! Jira REST API error types.
//!
//! Errors are classified by what the worker should make of them:
//!
//! - **Transient**: 429, 5xx and network failures. The message is dropped;
//!   Jira is the retry authority for webhook deliveries.
//! - **PermissionDenied**: 401/403, or a connection without usable
//!   credentials. The acting user cannot see the resource.
//! - **NotFound**: 404.
//! - **Permanent**: every other 4xx, and bodies we cannot decode.

use std::fmt;
use thiserror::Error;

/// The kind of Jira API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Transient,
    PermissionDenied,
    NotFound,
    Permanent,
}

impl ApiErrorKind {
    /// Classifies an HTTP error status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ApiErrorKind::Transient,
            401 | 403 => ApiErrorKind::PermissionDenied,
            404 => ApiErrorKind::NotFound,
            code if (500..600).contains(&code) => ApiErrorKind::Transient,
            _ => ApiErrorKind::Permanent,
        }
    }
}

/// A Jira API error with its classification.
#[derive(Debug, Error)]
pub struct ApiError {
    pub kind: ApiErrorKind,

    /// The HTTP status code, if the server answered.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "Jira API error (HTTP {}): {}", code, self.message),
            None => write!(f, "Jira API error: {}", self.message),
        }
    }
}

impl ApiError {
    fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Transient, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Permanent, message)
    }

    /// Creates an error for a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            kind: ApiErrorKind::from_status(status),
            status_code: Some(status),
            message: truncate_for_error(body, 200),
            source: None,
        }
    }

    /// Categorizes a reqwest error.
    ///
    /// Status errors are classified by code; timeouts and connection
    /// failures are transient; decode failures are permanent.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let kind = match status_code {
            Some(code) => ApiErrorKind::from_status(code),
            None if err.is_timeout() || err.is_connect() || err.is_request() => {
                ApiErrorKind::Transient
            }
            None => ApiErrorKind::Permanent,
        };
        Self {
            kind,
            status_code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ApiErrorKind::Transient
    }
}

/// Shortens a response body for inclusion in an error message.
pub(crate) fn truncate_for_error(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
