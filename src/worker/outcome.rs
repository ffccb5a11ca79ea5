//! How a pipeline run ended.
//!
//! Every run ends in exactly one of three states:
//!
//! - **Delivered**: ran to completion. Zero deliveries is still delivered.
//! - **Ignored**: nothing to do. Not an error.
//! - **Failed**: a stage failed; the message is dropped without retry.
//!
//! Stages report through [`Halt`], and [`Outcome::from`] is the single
//! place a halt is classified.

use thiserror::Error;

use crate::jira::{ApiError, ApiErrorKind};
use crate::notify::{ChannelReport, DirectReport};
use crate::store::StoreError;
use crate::types::{AccountId, InstanceId};
use crate::webhooks::ParseError;

/// What a delivered run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub direct: DirectReport,
    pub channels: ChannelReport,

    /// The comment's visibility restriction, empty when public.
    pub visibility: String,
}

/// Why a run had nothing to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The payload describes nothing actionable.
    NotActionable,

    /// No instance is installed under the delivery's id.
    InstanceNotInstalled(InstanceId),

    /// The acting user has no connection, so visibility cannot be checked.
    AuthorNotConnected(AccountId),
}

/// How a failure should be read by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or remote-side trouble; a later delivery may succeed.
    Transient,

    /// The acting user may not read the resource.
    PermissionDenied,

    /// Anything else.
    FatalToMessage,
}

/// Errors a pipeline stage can fail with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{stage} failed: {source}")]
    Api {
        stage: &'static str,
        #[source]
        source: ApiError,
    },

    /// The run panicked or was torn down.
    #[error("pipeline aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    pub fn api(stage: &'static str, source: ApiError) -> Self {
        PipelineError::Api { stage, source }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Api { source, .. } => match source.kind {
                ApiErrorKind::Transient => FailureKind::Transient,
                ApiErrorKind::PermissionDenied => FailureKind::PermissionDenied,
                ApiErrorKind::NotFound | ApiErrorKind::Permanent => FailureKind::FatalToMessage,
            },
            PipelineError::Parse(_) | PipelineError::Store(_) | PipelineError::Aborted(_) => {
                FailureKind::FatalToMessage
            }
        }
    }
}

/// A stage's early exit.
#[derive(Debug)]
pub enum Halt {
    Ignore(IgnoreReason),
    Fail(PipelineError),
}

impl From<PipelineError> for Halt {
    fn from(err: PipelineError) -> Self {
        Halt::Fail(err)
    }
}

impl From<ParseError> for Halt {
    fn from(err: ParseError) -> Self {
        Halt::Fail(err.into())
    }
}

impl From<StoreError> for Halt {
    fn from(err: StoreError) -> Self {
        Halt::Fail(err.into())
    }
}

#[derive(Debug)]
pub struct Failure {
    pub kind: FailureKind,
    pub error: PipelineError,
}

#[derive(Debug)]
pub enum Outcome {
    Delivered(DeliveryReport),
    Ignored(IgnoreReason),
    Failed(Failure),
}

impl Outcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered(_))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

impl From<Result<DeliveryReport, Halt>> for Outcome {
    fn from(result: Result<DeliveryReport, Halt>) -> Self {
        match result {
            Ok(report) => Outcome::Delivered(report),
            Err(Halt::Ignore(reason)) => Outcome::Ignored(reason),
            Err(Halt::Fail(error)) => Outcome::Failed(Failure {
                kind: error.kind(),
                error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_failures_classify_by_kind() {
        let cases = [
            (ApiError::transient("reset"), FailureKind::Transient),
            (ApiError::from_status(503, ""), FailureKind::Transient),
            (ApiError::from_status(403, ""), FailureKind::PermissionDenied),
            (ApiError::from_status(401, ""), FailureKind::PermissionDenied),
            (ApiError::from_status(404, ""), FailureKind::FatalToMessage),
            (ApiError::permanent("bad body"), FailureKind::FatalToMessage),
        ];
        for (error, expected) in cases {
            let outcome = Outcome::from(Err(Halt::from(PipelineError::api("visibility", error))));
            assert_eq!(outcome.failure_kind(), Some(expected));
        }
    }

    #[test]
    fn store_and_parse_failures_are_fatal() {
        let parse = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let outcome = Outcome::from(Err(Halt::from(ParseError::from(parse))));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::FatalToMessage));

        let outcome = Outcome::from(Err(Halt::from(StoreError::not_found("instance", "x"))));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::FatalToMessage));
    }

    #[test]
    fn ignore_is_not_a_failure() {
        let outcome = Outcome::from(Err(Halt::Ignore(IgnoreReason::NotActionable)));
        assert!(outcome.is_ignored());
        assert!(!outcome.is_failed());
        assert_eq!(outcome.failure_kind(), None);
    }

    #[test]
    fn success_is_delivered() {
        let outcome = Outcome::from(Ok(DeliveryReport::default()));
        assert!(outcome.is_delivered());
    }
}
