//! Markdown rendering of events for Mattermost.
//!
//! Everything here is a pure function of the event and the instance, so
//! two workers rendering the same event produce byte-identical posts.

use crate::types::{Instance, NotificationRole};

use super::events::{Event, EventFlag, EventKind};

/// What the actor did, as it reads after their name.
fn verb(event: &Event) -> &'static str {
    match event.kind {
        EventKind::IssueCreated => "created",
        EventKind::IssueDeleted => "deleted",
        EventKind::CommentCreated => "commented on",
        EventKind::CommentUpdated => "edited a comment on",
        EventKind::CommentDeleted => "deleted a comment on",
        EventKind::IssueUpdated => {
            let flags = &event.flags;
            if flags.contains(EventFlag::Resolved) {
                "resolved"
            } else if flags.contains(EventFlag::Reopened) {
                "reopened"
            } else if flags.len() == 1 && flags.contains(EventFlag::UpdatedStatus) {
                "transitioned"
            } else if flags.len() == 1 && flags.contains(EventFlag::UpdatedAssignee) {
                "changed the assignee of"
            } else {
                "updated"
            }
        }
    }
}

fn issue_link(event: &Event, instance: &Instance) -> String {
    let key = event.issue.key.as_str();
    let mut link = format!("[{}]({})", key, instance.browse_url(key));
    if let Some(summary) = event.issue.fields.summary.as_deref().filter(|s| !s.is_empty()) {
        link.push_str(": ");
        link.push_str(summary);
    }
    link
}

/// Appends the comment body as a quote, or the changelog as a list.
fn push_details(out: &mut String, event: &Event) {
    if let Some(comment) = &event.comment {
        if event.kind != EventKind::CommentDeleted && !comment.body.is_empty() {
            out.push('\n');
            for line in comment.body.lines() {
                out.push_str("\n> ");
                out.push_str(line);
            }
        }
        return;
    }

    let changes: Vec<String> = event
        .changelog
        .iter()
        .map(|item| {
            let from = item.from_string.as_deref().unwrap_or("None");
            let to = item.to_string.as_deref().unwrap_or("None");
            format!("- **{}**: {} → {}", item.field, from, to)
        })
        .collect();
    if !changes.is_empty() {
        out.push('\n');
        for change in changes {
            out.push('\n');
            out.push_str(&change);
        }
    }
}

/// Renders the post sent to subscribed channels.
///
/// ```text
/// Alice commented on [PROJ-1](https://jira.example.com/browse/PROJ-1): Fix the widget
///
/// > Looks good
/// ```
pub fn channel_message(event: &Event, instance: &Instance) -> String {
    let mut out = format!(
        "{} {} {}",
        event.actor_label(),
        verb(event),
        issue_link(event, instance)
    );
    push_details(&mut out, event);
    out
}

/// Renders a direct message, leading with why the recipient receives it.
pub fn direct_message(event: &Event, instance: &Instance, role: NotificationRole) -> String {
    let reason = match role {
        NotificationRole::Assignee if event.kind.is_comment() => {
            "commented on your assigned issue".to_string()
        }
        NotificationRole::Assignee => "assigned you to".to_string(),
        NotificationRole::Mention => "mentioned you on".to_string(),
        NotificationRole::Reporter => "commented on your reported issue".to_string(),
        NotificationRole::Watching => format!("{} watched issue", verb(event)),
    };
    let mut out = format!(
        "{} {} {}",
        event.actor_label(),
        reason,
        issue_link(event, instance)
    );
    push_details(&mut out, event);
    out
}
