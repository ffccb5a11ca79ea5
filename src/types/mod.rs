//! Core domain types for the relay.
//!
//! Identifiers, the instance/connection records the stores own, and the
//! channel subscriptions events are matched against.

pub mod connection;
pub mod ids;
pub mod subscription;

// Re-export commonly used types at the module level
pub use connection::{
    Connection, ConnectionSettings, Credentials, Instance, InstanceKind, NotificationRole,
    UnknownRole,
};
pub use ids::{AccountId, ChannelId, CommentId, InstanceId, IssueKey, MattermostUserId, PostId};
pub use subscription::{
    COMMENT_VISIBILITY_FIELD, FieldFilter, FilterInclusion, Subscription, SubscriptionFilters,
};
