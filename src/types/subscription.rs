//! Channel subscriptions and the rules deciding which events they accept.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{ChannelId, InstanceId};
use crate::webhooks::events::{Event, EventFlag};

/// Field key of the filter that gates restricted comments.
pub const COMMENT_VISIBILITY_FIELD: &str = "commentVisibility";

/// A channel's stored interest in an instance's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub channel_id: ChannelId,
    pub name: String,
    pub instance_id: InstanceId,
    pub filters: SubscriptionFilters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilters {
    /// Flags this subscription wants. Must intersect the event's flags.
    #[serde(default)]
    pub events: BTreeSet<EventFlag>,

    /// Project keys. Empty accepts every project.
    #[serde(default)]
    pub projects: BTreeSet<String>,

    /// Issue type ids (or names). Empty accepts every type.
    #[serde(default)]
    pub issue_types: BTreeSet<String>,

    #[serde(default)]
    pub fields: Vec<FieldFilter>,
}

/// How a field filter compares its values against the issue's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterInclusion {
    IncludeAny,
    IncludeAll,
    ExcludeAny,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub key: String,
    pub inclusion: FilterInclusion,
    #[serde(default)]
    pub values: BTreeSet<String>,
}

impl FieldFilter {
    /// A filter without values constrains nothing, unless it asks for emptiness.
    pub fn is_active(&self) -> bool {
        self.inclusion == FilterInclusion::Empty || !self.values.is_empty()
    }

    /// Tests the filter against the values the issue holds for its field.
    pub fn accepts(&self, actual: &[String]) -> bool {
        match self.inclusion {
            FilterInclusion::IncludeAny => actual.iter().any(|v| self.values.contains(v)),
            FilterInclusion::IncludeAll => self
                .values
                .iter()
                .all(|wanted| actual.iter().any(|v| v == wanted)),
            FilterInclusion::ExcludeAny => !actual.iter().any(|v| self.values.contains(v)),
            FilterInclusion::Empty => actual.is_empty(),
        }
    }
}

impl Subscription {
    /// Returns true if this subscription should receive `event`.
    ///
    /// `visibility` is the comment's restriction, empty when public. A
    /// restricted comment only reaches subscriptions carrying an active
    /// `commentVisibility` filter that accepts it.
    pub fn matches(&self, event: &Event, visibility: &str) -> bool {
        let filters = &self.filters;

        let wants_event = filters.events.iter().any(|wanted| match wanted {
            EventFlag::UpdatedAny => event.flags.iter().any(|f| f.is_issue_update()),
            flag => event.flags.contains(*flag),
        });
        if !wants_event {
            return false;
        }

        if !filters.projects.is_empty() && !filters.projects.contains(event.issue.project_key()) {
            return false;
        }

        if !filters.issue_types.is_empty() {
            let Some(issue_type) = &event.issue.fields.issue_type else {
                return false;
            };
            if !filters.issue_types.contains(&issue_type.id)
                && !filters.issue_types.contains(&issue_type.name)
            {
                return false;
            }
        }

        let visibility_values: Vec<String> = if visibility.is_empty() {
            Vec::new()
        } else {
            vec![visibility.to_string()]
        };
        let mut visibility_filtered = false;

        for filter in filters.fields.iter().filter(|f| f.is_active()) {
            let accepted = if filter.key == COMMENT_VISIBILITY_FIELD {
                visibility_filtered = true;
                filter.accepts(&visibility_values)
            } else {
                filter.accepts(&event.issue.field_values(&filter.key))
            };
            if !accepted {
                return false;
            }
        }

        visibility.is_empty() || visibility_filtered
    }
}
