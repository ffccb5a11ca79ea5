//! Jira webhook payload parser.
//!
//! This module parses raw webhook JSON payloads into typed [`Event`] values.
//!
//! # Parsing Strategy
//!
//! 1. The declared type is read from the payload's `webhookEvent` field
//!    (and, for `jira:issue_updated`, from `issue_event_type_name`)
//! 2. The event kind and its flags are derived from the declared type and
//!    the changelog
//! 3. Declared types we don't handle, and updates touching no field we
//!    classify, return `Ok(None)` (ignored, not an error)
//! 4. Malformed payloads return `Err` with details
//!
//! Optional sub-structures (actor, fields, changelog, watchers) may be
//! absent or `null` without failing the parse.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::types::{AccountId, CommentId, IssueKey, NotificationRole};

use super::events::{
    ChangeItem, CommentRef, DirectNotification, Event, EventFlag, EventFlags, EventKind,
    IssueFields, IssueRef, IssueTypeRef, JiraUser, ProjectRef,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes type mismatches).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A field the event kind cannot do without is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Parses a webhook payload into a typed event.
///
/// # Returns
///
/// * `Ok(Some(event))` - Successfully parsed an actionable event
/// * `Ok(None)` - Nothing actionable (ignored, not an error)
/// * `Err(e)` - Malformed payload or missing required fields
///
/// The same bytes always produce the same event.
///
/// # Examples
///
/// ```
/// use jira_relay::webhooks::parse_webhook;
///
/// let payload = br#"{
///     "webhookEvent": "comment_created",
///     "comment": {
///         "id": "10000",
///         "self": "https://example.atlassian.net/rest/api/2/issue/10001/comment/10000",
///         "body": "Looks good",
///         "author": { "accountId": "acct123", "displayName": "Alice" }
///     },
///     "issue": { "id": "10001", "key": "PROJ-1" }
/// }"#;
///
/// let event = parse_webhook(payload).unwrap().expect("actionable");
/// assert!(event.is_comment_event());
/// ```
pub fn parse_webhook(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawWebhook = serde_json::from_slice(payload)?;

    let Some(kind) = classify(&raw) else {
        return Ok(None);
    };

    let raw_issue = raw.issue.ok_or(ParseError::MissingField("issue"))?;
    let fields = raw_issue.fields.map(RawIssueFields::into_fields).unwrap_or_default();
    let changelog: Vec<ChangeItem> = raw
        .changelog
        .map(|c| c.items.into_iter().map(RawChangeItem::into_item).collect())
        .unwrap_or_default();

    let flags = derive_flags(kind, &fields, &changelog);
    if flags.is_empty() {
        return Ok(None);
    }

    let comment = if kind.is_comment() {
        let raw_comment = raw.comment.ok_or(ParseError::MissingField("comment"))?;
        Some(raw_comment.into_comment()?)
    } else {
        None
    };

    let key = raw_issue.key.ok_or(ParseError::MissingField("issue.key"))?;
    let self_link = match (raw_issue.self_link, &comment) {
        (Some(link), _) => link,
        // Comment events carry their canonical link on the comment.
        (None, Some(_)) => String::new(),
        (None, None) => return Err(ParseError::MissingField("issue.self")),
    };

    let issue = IssueRef {
        id: raw_issue.id.unwrap_or_else(|| key.clone()),
        key: IssueKey::new(key),
        self_link,
        fields,
    };

    let actor = raw.user.and_then(RawUser::into_user);
    let timestamp = raw.timestamp.and_then(DateTime::<Utc>::from_timestamp_millis);

    let mut event = Event {
        kind,
        flags,
        issue,
        actor,
        comment,
        changelog,
        timestamp,
        notifications: Vec::new(),
    };
    event.notifications = direct_notifications(&event);

    Ok(Some(event))
}

/// Resolves the event kind from the declared webhook type.
fn classify(raw: &RawWebhook) -> Option<EventKind> {
    match raw.webhook_event.as_str() {
        "jira:issue_created" => Some(EventKind::IssueCreated),
        "jira:issue_deleted" => Some(EventKind::IssueDeleted),
        "jira:issue_updated" => match raw.issue_event_type_name.as_deref() {
            Some("issue_commented") => Some(EventKind::CommentCreated),
            Some("issue_comment_edited") => Some(EventKind::CommentUpdated),
            Some("issue_comment_deleted") => Some(EventKind::CommentDeleted),
            _ => Some(EventKind::IssueUpdated),
        },
        "comment_created" => Some(EventKind::CommentCreated),
        "comment_updated" => Some(EventKind::CommentUpdated),
        "comment_deleted" => Some(EventKind::CommentDeleted),
        // Worklogs, sprints, projects, versions, ...
        _ => None,
    }
}

fn derive_flags(kind: EventKind, fields: &IssueFields, changelog: &[ChangeItem]) -> EventFlags {
    let mut flags = EventFlags::new();
    match kind {
        EventKind::IssueCreated => {
            flags.insert(EventFlag::Created);
        }
        EventKind::IssueDeleted => {
            flags.insert(EventFlag::Deleted);
            if fields.resolution.is_none() {
                flags.insert(EventFlag::DeletedUnresolved);
            }
        }
        EventKind::CommentCreated => {
            flags.insert(EventFlag::CreatedComment);
        }
        EventKind::CommentUpdated => {
            flags.insert(EventFlag::UpdatedComment);
        }
        EventKind::CommentDeleted => {
            flags.insert(EventFlag::DeletedComment);
        }
        EventKind::IssueUpdated => {
            for item in changelog {
                if let Some(flag) = changelog_flag(item) {
                    flags.insert(flag);
                }
            }
        }
    }
    flags
}

/// Maps one changelog entry to the flag it represents, if any.
fn changelog_flag(item: &ChangeItem) -> Option<EventFlag> {
    let flag = match item.field.to_lowercase().as_str() {
        "assignee" => EventFlag::UpdatedAssignee,
        "attachment" => EventFlag::UpdatedAttachment,
        "description" => EventFlag::UpdatedDescription,
        "labels" => EventFlag::UpdatedLabels,
        "priority" => EventFlag::UpdatedPriority,
        "rank" => EventFlag::UpdatedRank,
        "sprint" => EventFlag::UpdatedSprint,
        "status" => EventFlag::UpdatedStatus,
        "summary" => EventFlag::UpdatedSummary,
        "issuetype" => EventFlag::UpdatedIssueType,
        "fix version" => EventFlag::UpdatedFixVersion,
        "version" => EventFlag::UpdatedAffectsVersion,
        "resolution" => {
            // Clearing the resolution reopens; setting one resolves.
            match item.to.as_deref().filter(|to| !to.is_empty()) {
                Some(_) => EventFlag::Resolved,
                None => EventFlag::Reopened,
            }
        }
        _ => return None,
    };
    Some(flag)
}

/// Builds the direct-message candidates for an event.
///
/// Recipients are de-duplicated by account: someone who qualifies under
/// several roles is notified once, under the earliest role in
/// [`NotificationRole::ALL`]. The acting user is never notified.
fn direct_notifications(event: &Event) -> Vec<DirectNotification> {
    let mut candidates: Vec<(JiraUser, NotificationRole)> = Vec::new();
    let fields = &event.issue.fields;

    match event.kind {
        EventKind::IssueCreated => {
            if let Some(assignee) = &fields.assignee {
                candidates.push((assignee.clone(), NotificationRole::Assignee));
            }
        }
        EventKind::IssueUpdated => {
            for item in &event.changelog {
                if item.field.eq_ignore_ascii_case("assignee") {
                    if let Some(to) = item.to.as_deref().filter(|to| !to.is_empty()) {
                        let name = item.to_string.clone().unwrap_or_default();
                        candidates.push((JiraUser::new(to, name), NotificationRole::Assignee));
                    }
                }
            }
        }
        EventKind::CommentCreated | EventKind::CommentUpdated => {
            if let Some(comment) = &event.comment {
                for account in parse_mentions(&comment.body) {
                    candidates.push((JiraUser::new(account, ""), NotificationRole::Mention));
                }
            }
            if let Some(assignee) = &fields.assignee {
                candidates.push((assignee.clone(), NotificationRole::Assignee));
            }
            if let Some(reporter) = &fields.reporter {
                candidates.push((reporter.clone(), NotificationRole::Reporter));
            }
        }
        EventKind::IssueDeleted | EventKind::CommentDeleted => {}
    }

    if matches!(
        event.kind,
        EventKind::IssueUpdated | EventKind::CommentCreated | EventKind::CommentUpdated
    ) {
        for watcher in &fields.watchers {
            candidates.push((watcher.clone(), NotificationRole::Watching));
        }
    }

    let acting = event.acting_account();
    let mut seen: HashSet<AccountId> = HashSet::new();
    let mut notifications = Vec::new();
    for role in NotificationRole::ALL {
        for (user, _) in candidates.iter().filter(|(_, r)| *r == role) {
            if Some(&user.account_id) == acting {
                continue;
            }
            if seen.insert(user.account_id.clone()) {
                notifications.push(DirectNotification {
                    recipient: user.clone(),
                    role,
                });
            }
        }
    }
    notifications
}

/// Extracts mentioned accounts from a comment body.
///
/// Jira Cloud writes mentions as `[~accountid:<id>]`, Jira Server as
/// `[~<username>]`.
pub fn parse_mentions(body: &str) -> Vec<AccountId> {
    let mut mentions = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("[~") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(']') else {
            break;
        };
        let inner = after[..end].trim();
        let account = inner.strip_prefix("accountid:").unwrap_or(inner);
        if !account.is_empty() && !mentions.iter().any(|m: &AccountId| m.as_str() == account) {
            mentions.push(AccountId::new(account));
        }
        rest = &after[end + 1..];
    }
    mentions
}

// ============================================================================
// Raw payload structures for deserialization
//
// These match Jira's webhook JSON structure. We use Option<T> liberally to
// handle missing or null fields gracefully, then validate required fields
// explicitly.
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWebhook {
    webhook_event: String,
    #[serde(default, rename = "issue_event_type_name")]
    issue_event_type_name: Option<String>,
    timestamp: Option<i64>,
    user: Option<RawUser>,
    issue: Option<RawIssue>,
    comment: Option<RawComment>,
    changelog: Option<RawChangelog>,
}

/// Jira user as it appears anywhere in a payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    account_id: Option<String>,
    name: Option<String>,
    key: Option<String>,
    display_name: Option<String>,
}

impl RawUser {
    /// Cloud identifies users by `accountId`, Server by `name` (or `key`).
    fn into_user(self) -> Option<JiraUser> {
        let account = self
            .account_id
            .or(self.name)
            .or(self.key)
            .filter(|id| !id.is_empty())?;
        Some(JiraUser::new(account, self.display_name.unwrap_or_default()))
    }
}

/// Decodes a Jira `GET issue` response into issue fields.
///
/// Shares the payload field mapping so that expanded fields compare
/// exactly like fields that arrived in the webhook.
pub fn parse_issue_fields(issue: serde_json::Value) -> Result<IssueFields, ParseError> {
    let raw: RawIssue = serde_json::from_value(issue)?;
    Ok(raw.fields.map(RawIssueFields::into_fields).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    key: Option<String>,
    #[serde(rename = "self")]
    self_link: Option<String>,
    fields: Option<RawIssueFields>,
}

#[derive(Debug, Deserialize)]
struct RawIssueFields {
    summary: Option<String>,
    project: Option<RawProject>,
    issuetype: Option<RawIssueType>,
    status: Option<RawNamed>,
    priority: Option<RawNamed>,
    resolution: Option<RawNamed>,
    assignee: Option<RawUser>,
    reporter: Option<RawUser>,
    labels: Option<Vec<String>>,
    watches: Option<RawWatches>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl RawIssueFields {
    fn into_fields(self) -> IssueFields {
        let custom = self
            .rest
            .into_iter()
            .filter(|(key, _)| key.starts_with("customfield_"))
            .filter_map(|(key, value)| {
                let values = flatten_field_value(&value);
                (!values.is_empty()).then_some((key, values))
            })
            .collect();

        IssueFields {
            summary: self.summary,
            project: self.project.map(|p| ProjectRef {
                id: p.id.unwrap_or_default(),
                key: p.key.unwrap_or_default(),
                name: p.name.unwrap_or_default(),
            }),
            issue_type: self.issuetype.map(|t| IssueTypeRef {
                id: t.id.unwrap_or_default(),
                name: t.name.unwrap_or_default(),
            }),
            status: self.status.and_then(|s| s.name),
            priority: self.priority.and_then(|p| p.name),
            resolution: self.resolution.and_then(|r| r.name),
            assignee: self.assignee.and_then(RawUser::into_user),
            reporter: self.reporter.and_then(RawUser::into_user),
            labels: self.labels.unwrap_or_default(),
            watchers: self
                .watches
                .and_then(|w| w.watchers)
                .unwrap_or_default()
                .into_iter()
                .filter_map(RawUser::into_user)
                .collect(),
            custom,
        }
    }
}

/// Flattens a custom field value into comparable strings.
///
/// Strings and numbers are taken as-is, option objects by `value` or
/// `name`, arrays element-wise. `null` yields nothing.
fn flatten_field_value(value: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items.iter().flat_map(flatten_field_value).collect(),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        Value::Null => Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    key: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssueType {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWatches {
    watchers: Option<Vec<RawUser>>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(rename = "self")]
    self_link: Option<String>,
    body: Option<String>,
    author: Option<RawUser>,
}

impl RawComment {
    fn into_comment(self) -> Result<CommentRef, ParseError> {
        Ok(CommentRef {
            id: CommentId::new(self.id.ok_or(ParseError::MissingField("comment.id"))?),
            self_link: self
                .self_link
                .ok_or(ParseError::MissingField("comment.self"))?,
            author: self
                .author
                .and_then(RawUser::into_user)
                .ok_or(ParseError::MissingField("comment.author"))?,
            body: self.body.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawChangelog {
    #[serde(default)]
    items: Vec<RawChangeItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChangeItem {
    field: String,
    #[serde(default, deserialize_with = "lenient_id")]
    from: Option<String>,
    from_string: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    to: Option<String>,
    to_string: Option<String>,
}

impl RawChangeItem {
    fn into_item(self) -> ChangeItem {
        ChangeItem {
            field: self.field,
            from: self.from,
            from_string: self.from_string,
            to: self.to,
            to_string: self.to_string,
        }
    }
}

/// Accepts ids sent either as JSON strings or numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ISSUE_SELF: &str = "https://jira.example.com/rest/api/2/issue/10001";
    const COMMENT_SELF: &str = "https://jira.example.com/rest/api/2/issue/10001/comment/20000";

    fn full_issue() -> serde_json::Value {
        serde_json::json!({
            "id": "10001",
            "key": "PROJ-1",
            "self": ISSUE_SELF,
            "fields": {
                "summary": "Fix the widget",
                "project": { "id": "100", "key": "PROJ", "name": "Project" },
                "issuetype": { "id": "1", "name": "Bug" },
                "status": { "name": "Open" },
                "priority": { "name": "High" },
                "resolution": null,
                "assignee": { "accountId": "acct-assignee", "displayName": "Ann" },
                "reporter": { "accountId": "acct-reporter", "displayName": "Rey" },
                "labels": ["backend"],
                "customfield_10010": { "value": "Team A" }
            }
        })
    }

    fn parse(value: serde_json::Value) -> Option<Event> {
        parse_webhook(&serde_json::to_vec(&value).unwrap()).unwrap()
    }

    // ========================================================================
    // Unit tests for each declared type
    // ========================================================================

    #[test]
    fn parse_issue_created() {
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_created",
            "timestamp": 1700000000000i64,
            "user": { "accountId": "acct-actor", "displayName": "Actor" },
            "issue": full_issue()
        }))
        .expect("should parse");

        assert_eq!(event.kind, EventKind::IssueCreated);
        assert_eq!(event.flags, EventFlags::from([EventFlag::Created]));
        assert_eq!(event.issue.key, IssueKey::new("PROJ-1"));
        assert_eq!(event.self_link(), ISSUE_SELF);
        assert_eq!(event.actor.as_ref().unwrap().account_id, AccountId::new("acct-actor"));
        assert_eq!(event.timestamp.unwrap().timestamp_millis(), 1700000000000);
        assert_eq!(
            event.issue.fields.custom.get("customfield_10010"),
            Some(&vec!["Team A".to_string()])
        );
        assert!(event.comment.is_none());
        assert!(!event.issue.needs_expansion());

        assert_eq!(event.notifications.len(), 1);
        assert_eq!(event.notifications[0].role, NotificationRole::Assignee);
    }

    #[test]
    fn parse_issue_deleted_unresolved() {
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_deleted",
            "issue": full_issue()
        }))
        .expect("should parse");

        assert_eq!(event.kind, EventKind::IssueDeleted);
        assert!(event.flags.contains(EventFlag::Deleted));
        assert!(event.flags.contains(EventFlag::DeletedUnresolved));
        assert!(event.notifications.is_empty());
    }

    #[test]
    fn parse_issue_deleted_resolved() {
        let mut issue = full_issue();
        issue["fields"]["resolution"] = serde_json::json!({ "name": "Done" });
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_deleted",
            "issue": issue
        }))
        .expect("should parse");

        assert_eq!(event.flags, EventFlags::from([EventFlag::Deleted]));
    }

    #[test]
    fn parse_issue_updated_changelog_flags() {
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue_event_type_name": "issue_generic",
            "user": { "accountId": "acct-actor" },
            "issue": full_issue(),
            "changelog": {
                "items": [
                    { "field": "status", "fromString": "Open", "toString": "Done", "from": "1", "to": "3" },
                    { "field": "resolution", "from": null, "to": "10000", "toString": "Done" },
                    { "field": "Fix Version", "toString": "1.2" },
                    { "field": "Some Custom Thing", "toString": "x" }
                ]
            }
        }))
        .expect("should parse");

        assert_eq!(event.kind, EventKind::IssueUpdated);
        assert_eq!(
            event.flags,
            EventFlags::from([
                EventFlag::UpdatedStatus,
                EventFlag::Resolved,
                EventFlag::UpdatedFixVersion
            ])
        );
        assert_eq!(event.changelog.len(), 4);
    }

    #[test]
    fn clearing_resolution_reopens() {
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue": full_issue(),
            "changelog": { "items": [ { "field": "resolution", "from": "10000", "to": null } ] }
        }))
        .expect("should parse");

        assert_eq!(event.flags, EventFlags::from([EventFlag::Reopened]));
    }

    #[test]
    fn assignee_change_notifies_new_assignee() {
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue_event_type_name": "issue_assigned",
            "user": { "accountId": "acct-actor" },
            "issue": full_issue(),
            "changelog": {
                "items": [ { "field": "assignee", "from": null, "to": "acct-new", "toString": "Newbie" } ]
            }
        }))
        .expect("should parse");

        assert_eq!(event.flags, EventFlags::from([EventFlag::UpdatedAssignee]));
        assert_eq!(
            event.notifications,
            vec![DirectNotification {
                recipient: JiraUser::new("acct-new", "Newbie"),
                role: NotificationRole::Assignee,
            }]
        );
    }

    #[test]
    fn parse_cloud_comment_created() {
        let event = parse(serde_json::json!({
            "webhookEvent": "comment_created",
            "comment": {
                "id": "20000",
                "self": COMMENT_SELF,
                "body": "ping [~accountid:acct-mentioned]",
                "author": { "accountId": "acct123", "displayName": "Alice" }
            },
            "issue": { "id": "10001", "key": "PROJ-1", "fields": { "summary": "Fix the widget" } }
        }))
        .expect("should parse");

        assert_eq!(event.kind, EventKind::CommentCreated);
        assert_eq!(event.flags, EventFlags::from([EventFlag::CreatedComment]));
        assert!(event.is_comment_event());
        assert_eq!(event.self_link(), COMMENT_SELF);
        assert_eq!(event.acting_account(), Some(&AccountId::new("acct123")));
        assert!(event.issue.needs_expansion());
        assert_eq!(event.issue.project_key(), "PROJ");

        let comment = event.comment.as_ref().unwrap();
        assert_eq!(comment.id, CommentId::new("20000"));
        assert_eq!(comment.author.display_name, "Alice");

        assert_eq!(event.notifications.len(), 1);
        assert_eq!(
            event.notifications[0].recipient.account_id,
            AccountId::new("acct-mentioned")
        );
        assert_eq!(event.notifications[0].role, NotificationRole::Mention);
    }

    #[test]
    fn parse_server_issue_commented() {
        let mut issue = full_issue();
        issue["fields"]["watches"] = serde_json::json!({
            "watchCount": 2,
            "watchers": [ { "name": "watcher1" }, { "name": "acct-assignee" } ]
        });
        let event = parse(serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue_event_type_name": "issue_commented",
            "user": { "name": "author", "displayName": "Author" },
            "comment": {
                "id": 20000,
                "self": COMMENT_SELF,
                "body": "cc [~acct-reporter] and [~author]",
                "author": { "name": "author" }
            },
            "issue": issue
        }))
        .expect("should parse");

        assert_eq!(event.kind, EventKind::CommentCreated);
        assert_eq!(event.comment.as_ref().unwrap().id, CommentId::new("20000"));

        // Reporter was mentioned, so they are notified once, as a mention.
        // The author mentioned themselves and is skipped. The assignee also
        // watches, and keeps the assignee role.
        let got: Vec<(String, NotificationRole)> = event
            .notifications
            .iter()
            .map(|n| (n.recipient.account_id.to_string(), n.role))
            .collect();
        assert_eq!(
            got,
            vec![
                ("acct-assignee".to_string(), NotificationRole::Assignee),
                ("acct-reporter".to_string(), NotificationRole::Mention),
                ("watcher1".to_string(), NotificationRole::Watching),
            ]
        );
    }

    #[test]
    fn parse_comment_deleted() {
        let event = parse(serde_json::json!({
            "webhookEvent": "comment_deleted",
            "comment": {
                "id": "20000",
                "self": COMMENT_SELF,
                "author": { "accountId": "acct123" }
            },
            "issue": { "id": "10001", "key": "PROJ-1" }
        }))
        .expect("should parse");

        assert_eq!(event.flags, EventFlags::from([EventFlag::DeletedComment]));
        assert_eq!(event.comment.as_ref().unwrap().body, "");
        assert!(event.notifications.is_empty());
    }

    // ========================================================================
    // Ignored payloads return Ok(None)
    // ========================================================================

    #[test]
    fn unknown_declared_types_are_ignored() {
        for declared in ["worklog_created", "sprint_started", "project_created", "jira:version_released"] {
            let payload = serde_json::json!({ "webhookEvent": declared });
            assert!(parse(payload).is_none(), "{} should be ignored", declared);
        }
    }

    #[test]
    fn update_with_unclassified_changelog_is_ignored() {
        let payload = serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue": full_issue(),
            "changelog": { "items": [ { "field": "timeestimate", "to": "3600" } ] }
        });
        assert!(parse(payload).is_none());
    }

    #[test]
    fn update_without_changelog_is_ignored() {
        let payload = serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue": full_issue()
        });
        assert!(parse(payload).is_none());
    }

    // ========================================================================
    // Error handling
    // ========================================================================

    #[test]
    fn malformed_json_returns_error() {
        let result = parse_webhook(b"not valid json");
        assert!(matches!(result, Err(ParseError::JsonError(_))));
    }

    #[test]
    fn missing_declared_type_returns_error() {
        let result = parse_webhook(br#"{ "issue": { "key": "PROJ-1" } }"#);
        assert!(matches!(result, Err(ParseError::JsonError(_))));
    }

    #[test]
    fn comment_event_without_comment_returns_error() {
        let payload = serde_json::json!({
            "webhookEvent": "comment_created",
            "issue": { "id": "1", "key": "PROJ-1" }
        });
        let result = parse_webhook(&serde_json::to_vec(&payload).unwrap());
        assert!(matches!(result, Err(ParseError::MissingField("comment"))));
    }

    #[test]
    fn comment_without_self_link_returns_error() {
        let payload = serde_json::json!({
            "webhookEvent": "comment_created",
            "comment": { "id": "1", "author": { "accountId": "a" } },
            "issue": { "id": "1", "key": "PROJ-1" }
        });
        let result = parse_webhook(&serde_json::to_vec(&payload).unwrap());
        assert!(matches!(result, Err(ParseError::MissingField("comment.self"))));
    }

    #[test]
    fn issue_event_without_self_link_returns_error() {
        let payload = serde_json::json!({
            "webhookEvent": "jira:issue_created",
            "issue": { "id": "1", "key": "PROJ-1" }
        });
        let result = parse_webhook(&serde_json::to_vec(&payload).unwrap());
        assert!(matches!(result, Err(ParseError::MissingField("issue.self"))));
    }

    #[test]
    fn missing_issue_returns_error() {
        let result = parse_webhook(br#"{ "webhookEvent": "jira:issue_created" }"#);
        assert!(matches!(result, Err(ParseError::MissingField("issue"))));
    }

    #[test]
    fn issue_response_fields_use_payload_mapping() {
        let fields = parse_issue_fields(full_issue()).unwrap();
        assert!(fields.is_complete());
        assert_eq!(fields.priority.as_deref(), Some("High"));
        assert_eq!(fields.assignee.unwrap().account_id, AccountId::new("acct-assignee"));
        assert_eq!(fields.custom["customfield_10010"], vec!["Team A".to_string()]);
    }

    // ========================================================================
    // Mentions
    // ========================================================================

    #[test]
    fn mentions_cloud_and_server_forms() {
        let body = "hi [~accountid:abc-123], [~jdoe] and again [~jdoe]; broken [~oops";
        assert_eq!(
            parse_mentions(body),
            vec![AccountId::new("abc-123"), AccountId::new("jdoe")]
        );
    }

    #[test]
    fn mentions_empty_body() {
        assert!(parse_mentions("").is_empty());
        assert!(parse_mentions("[~]").is_empty());
    }

    // ========================================================================
    // Determinism
    // ========================================================================

    proptest! {
        #[test]
        fn same_bytes_same_event(
            fields in prop::collection::vec(
                prop_oneof![
                    Just("status"), Just("assignee"), Just("labels"), Just("Sprint"),
                    Just("resolution"), Just("timetracking"), Just("summary")
                ],
                0..6
            ),
            to in prop::option::of("[a-z0-9]{1,8}"),
        ) {
            let items: Vec<serde_json::Value> = fields
                .iter()
                .map(|f| serde_json::json!({ "field": f, "to": to }))
                .collect();
            let payload = serde_json::to_vec(&serde_json::json!({
                "webhookEvent": "jira:issue_updated",
                "user": { "accountId": "actor" },
                "issue": full_issue(),
                "changelog": { "items": items }
            }))
            .unwrap();

            let first = parse_webhook(&payload).unwrap();
            let second = parse_webhook(&payload).unwrap();
            prop_assert_eq!(&first, &second);

            // Ignored exactly when no classified field changed.
            let classified = fields.iter().any(|f| *f != "timetracking");
            prop_assert_eq!(first.is_some(), classified);
        }
    }
}
