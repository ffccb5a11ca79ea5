//! Jira webhook event types.
//!
//! A parsed webhook is an [`Event`]: one [`EventKind`] discriminant resolved
//! at parse time, the issue and (optional) comment it concerns, and the set
//! of [`EventFlag`]s that channel subscriptions are matched against.
//!
//! Events live for one pipeline run and are never persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, CommentId, IssueKey, NotificationRole};

/// What happened, resolved once from the payload's declared webhook type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    IssueCreated,
    IssueUpdated,
    IssueDeleted,
    CommentCreated,
    CommentUpdated,
    CommentDeleted,
}

impl EventKind {
    /// Returns true for the three comment kinds.
    pub fn is_comment(&self) -> bool {
        matches!(
            self,
            EventKind::CommentCreated | EventKind::CommentUpdated | EventKind::CommentDeleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::IssueCreated => "issue_created",
            EventKind::IssueUpdated => "issue_updated",
            EventKind::IssueDeleted => "issue_deleted",
            EventKind::CommentCreated => "comment_created",
            EventKind::CommentUpdated => "comment_updated",
            EventKind::CommentDeleted => "comment_deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of the fixed classification that subscriptions filter on.
///
/// The serialized names are the ones stored in subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventFlag {
    #[serde(rename = "event_created")]
    Created,
    #[serde(rename = "event_deleted")]
    Deleted,
    #[serde(rename = "event_deleted_unresolved")]
    DeletedUnresolved,
    #[serde(rename = "event_created_comment")]
    CreatedComment,
    #[serde(rename = "event_updated_comment")]
    UpdatedComment,
    #[serde(rename = "event_deleted_comment")]
    DeletedComment,
    #[serde(rename = "event_updated_assignee")]
    UpdatedAssignee,
    #[serde(rename = "event_updated_attachment")]
    UpdatedAttachment,
    #[serde(rename = "event_updated_description")]
    UpdatedDescription,
    #[serde(rename = "event_updated_labels")]
    UpdatedLabels,
    #[serde(rename = "event_updated_priority")]
    UpdatedPriority,
    #[serde(rename = "event_updated_rank")]
    UpdatedRank,
    #[serde(rename = "event_updated_sprint")]
    UpdatedSprint,
    #[serde(rename = "event_updated_status")]
    UpdatedStatus,
    #[serde(rename = "event_updated_summary")]
    UpdatedSummary,
    #[serde(rename = "event_updated_issue_type")]
    UpdatedIssueType,
    #[serde(rename = "event_updated_fix_version")]
    UpdatedFixVersion,
    #[serde(rename = "event_updated_affects_version")]
    UpdatedAffectsVersion,
    #[serde(rename = "event_updated_reopened")]
    Reopened,
    #[serde(rename = "event_updated_resolved")]
    Resolved,
    /// Only meaningful in a subscription: matches any issue-update flag.
    #[serde(rename = "event_updated_any")]
    UpdatedAny,
}

/// The flags that make an event a comment event.
pub const COMMENT_FLAGS: [EventFlag; 3] = [
    EventFlag::CreatedComment,
    EventFlag::UpdatedComment,
    EventFlag::DeletedComment,
];

impl EventFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFlag::Created => "event_created",
            EventFlag::Deleted => "event_deleted",
            EventFlag::DeletedUnresolved => "event_deleted_unresolved",
            EventFlag::CreatedComment => "event_created_comment",
            EventFlag::UpdatedComment => "event_updated_comment",
            EventFlag::DeletedComment => "event_deleted_comment",
            EventFlag::UpdatedAssignee => "event_updated_assignee",
            EventFlag::UpdatedAttachment => "event_updated_attachment",
            EventFlag::UpdatedDescription => "event_updated_description",
            EventFlag::UpdatedLabels => "event_updated_labels",
            EventFlag::UpdatedPriority => "event_updated_priority",
            EventFlag::UpdatedRank => "event_updated_rank",
            EventFlag::UpdatedSprint => "event_updated_sprint",
            EventFlag::UpdatedStatus => "event_updated_status",
            EventFlag::UpdatedSummary => "event_updated_summary",
            EventFlag::UpdatedIssueType => "event_updated_issue_type",
            EventFlag::UpdatedFixVersion => "event_updated_fix_version",
            EventFlag::UpdatedAffectsVersion => "event_updated_affects_version",
            EventFlag::Reopened => "event_updated_reopened",
            EventFlag::Resolved => "event_updated_resolved",
            EventFlag::UpdatedAny => "event_updated_any",
        }
    }

    /// Returns true for flags describing a change to an existing issue
    /// (the flags `event_updated_any` stands for).
    pub fn is_issue_update(&self) -> bool {
        !matches!(
            self,
            EventFlag::Created
                | EventFlag::Deleted
                | EventFlag::DeletedUnresolved
                | EventFlag::CreatedComment
                | EventFlag::UpdatedComment
                | EventFlag::DeletedComment
                | EventFlag::UpdatedAny
        )
    }

    pub fn is_comment(&self) -> bool {
        COMMENT_FLAGS.contains(self)
    }
}

impl fmt::Display for EventFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of event flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventFlags(BTreeSet<EventFlag>);

impl EventFlags {
    pub fn new() -> Self {
        EventFlags(BTreeSet::new())
    }

    pub fn insert(&mut self, flag: EventFlag) -> bool {
        self.0.insert(flag)
    }

    pub fn contains(&self, flag: EventFlag) -> bool {
        self.0.contains(&flag)
    }

    /// Returns true if any flag is in both sets.
    pub fn intersects(&self, other: &EventFlags) -> bool {
        self.0.iter().any(|flag| other.0.contains(flag))
    }

    /// Returns true if any of `flags` is in this set.
    pub fn contains_any(&self, flags: &[EventFlag]) -> bool {
        flags.iter().any(|flag| self.0.contains(flag))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EventFlag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<EventFlag> for EventFlags {
    fn from_iter<I: IntoIterator<Item = EventFlag>>(iter: I) -> Self {
        EventFlags(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[EventFlag; N]> for EventFlags {
    fn from(flags: [EventFlag; N]) -> Self {
        flags.into_iter().collect()
    }
}

/// A Jira user as it appears in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JiraUser {
    pub account_id: AccountId,
    pub display_name: String,
}

impl JiraUser {
    pub fn new(account_id: impl Into<AccountId>, display_name: impl Into<String>) -> Self {
        JiraUser {
            account_id: account_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Display name, falling back to the account id.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            self.account_id.as_str()
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTypeRef {
    pub id: String,
    pub name: String,
}

/// The issue fields the relay renders and filters on.
///
/// Comment webhooks from Jira Cloud omit most of these; the issue expander
/// fills in whatever is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFields {
    pub summary: Option<String>,
    pub project: Option<ProjectRef>,
    pub issue_type: Option<IssueTypeRef>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub resolution: Option<String>,
    pub assignee: Option<JiraUser>,
    pub reporter: Option<JiraUser>,
    pub labels: Vec<String>,
    pub watchers: Vec<JiraUser>,

    /// Custom field values flattened to strings, keyed by field id
    /// (`customfield_10010`).
    pub custom: BTreeMap<String, Vec<String>>,
}

impl IssueFields {
    /// Returns true once everything needed for matching and rendering is present.
    pub fn is_complete(&self) -> bool {
        self.summary.is_some() && self.project.is_some() && self.issue_type.is_some()
    }

    /// Fills every missing field from `other`, leaving present ones untouched.
    pub fn fill_missing_from(&mut self, other: IssueFields) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.summary, other.summary);
        fill(&mut self.project, other.project);
        fill(&mut self.issue_type, other.issue_type);
        fill(&mut self.status, other.status);
        fill(&mut self.priority, other.priority);
        fill(&mut self.resolution, other.resolution);
        fill(&mut self.assignee, other.assignee);
        fill(&mut self.reporter, other.reporter);
        if self.labels.is_empty() {
            self.labels = other.labels;
        }
        if self.watchers.is_empty() {
            self.watchers = other.watchers;
        }
        for (key, values) in other.custom {
            self.custom.entry(key).or_insert(values);
        }
    }
}

/// The issue an event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: String,
    pub key: IssueKey,
    pub self_link: String,
    pub fields: IssueFields,
}

impl IssueRef {
    /// Returns true if the expander has to fetch the issue.
    pub fn needs_expansion(&self) -> bool {
        !self.fields.is_complete()
    }

    /// Project key, from the fields if known, otherwise from the issue key.
    pub fn project_key(&self) -> &str {
        match &self.fields.project {
            Some(project) => &project.key,
            None => self.key.project_key(),
        }
    }

    /// Returns the values a subscription field filter compares against.
    ///
    /// Unknown keys yield no values.
    pub fn field_values(&self, key: &str) -> Vec<String> {
        let fields = &self.fields;
        match key {
            "labels" => fields.labels.clone(),
            "priority" => fields.priority.iter().cloned().collect(),
            "status" => fields.status.iter().cloned().collect(),
            "resolution" => fields.resolution.iter().cloned().collect(),
            "issuetype" => fields.issue_type.iter().map(|t| t.id.clone()).collect(),
            "project" => vec![self.project_key().to_string()],
            "assignee" => fields
                .assignee
                .iter()
                .map(|u| u.account_id.to_string())
                .collect(),
            "reporter" => fields
                .reporter
                .iter()
                .map(|u| u.account_id.to_string())
                .collect(),
            other => fields.custom.get(other).cloned().unwrap_or_default(),
        }
    }
}

/// The comment a comment event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    pub id: CommentId,

    /// Canonical REST link; the visibility resolver reads it.
    pub self_link: String,

    pub author: JiraUser,

    /// Empty for deleted comments.
    pub body: String,
}

/// One changelog entry of an issue update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItem {
    pub field: String,
    pub from: Option<String>,
    pub from_string: Option<String>,
    pub to: Option<String>,
    pub to_string: Option<String>,
}

/// A direct message the event asks for, before settings are consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectNotification {
    pub recipient: JiraUser,
    pub role: NotificationRole,
}

/// A parsed Jira webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,

    /// Never empty: payloads matching no flag are ignored by the parser.
    pub flags: EventFlags,

    pub issue: IssueRef,

    /// The user who triggered the webhook, if the payload names one.
    pub actor: Option<JiraUser>,

    /// Present exactly for comment kinds.
    pub comment: Option<CommentRef>,

    pub changelog: Vec<ChangeItem>,

    pub timestamp: Option<DateTime<Utc>>,

    /// Direct-message candidates in delivery order.
    pub notifications: Vec<DirectNotification>,
}

impl Event {
    /// The canonical link of the resource the event is about: the comment
    /// for comment events, the issue otherwise.
    pub fn self_link(&self) -> &str {
        match &self.comment {
            Some(comment) => &comment.self_link,
            None => &self.issue.self_link,
        }
    }

    /// Returns true if any comment flag is set.
    pub fn is_comment_event(&self) -> bool {
        self.flags.contains_any(&COMMENT_FLAGS)
    }

    /// The account whose Jira permissions stand in for "may this be shown":
    /// the triggering comment's author for comment events, the actor otherwise.
    pub fn acting_account(&self) -> Option<&AccountId> {
        match &self.comment {
            Some(comment) => Some(&comment.author.account_id),
            None => self.actor.as_ref().map(|actor| &actor.account_id),
        }
    }

    /// The user credited with the change in rendered messages.
    pub fn actor_label(&self) -> &str {
        match (&self.actor, &self.comment) {
            (Some(actor), _) => actor.label(),
            (None, Some(comment)) => comment.author.label(),
            (None, None) => "Someone",
        }
    }
}
