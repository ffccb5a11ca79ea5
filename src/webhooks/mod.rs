//! Jira webhook handling.
//!
//! This module provides:
//! - Authentication of deliveries (HMAC-SHA256 signature or shared secret)
//! - The typed event model and the payload parser
//! - Markdown rendering of events for channels and direct messages

pub mod events;
pub mod parser;
pub mod render;
pub mod signature;

pub use events::{
    COMMENT_FLAGS, ChangeItem, CommentRef, DirectNotification, Event, EventFlag, EventFlags,
    EventKind, IssueFields, IssueRef, IssueTypeRef, JiraUser, ProjectRef,
};
pub use parser::{ParseError, parse_issue_fields, parse_mentions, parse_webhook};
pub use signature::{
    SIGNATURE_HEADER, authenticate, compute_signature, format_signature_header,
    parse_signature_header, verify_query_secret, verify_signature,
};
