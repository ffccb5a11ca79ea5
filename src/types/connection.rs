//! Jira instances, user connections and per-user notification settings.
//!
//! These are owned by the stores; the relay only ever reads them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{AccountId, InstanceId};

/// Which flavour of Jira an instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    /// Atlassian-hosted Jira. Comment webhooks omit most issue fields.
    #[default]
    Cloud,
    /// Self-hosted Jira Server / Data Center.
    Server,
}

/// A registered Jira deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,

    /// Base URL without a trailing slash, e.g. `https://example.atlassian.net`.
    pub base_url: String,

    #[serde(default)]
    pub kind: InstanceKind,
}

impl Instance {
    pub fn new(id: impl Into<InstanceId>, base_url: impl Into<String>, kind: InstanceKind) -> Self {
        let base_url: String = base_url.into();
        Instance {
            id: id.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            kind,
        }
    }

    /// Returns the browser URL for an issue key.
    pub fn browse_url(&self, issue_key: &str) -> String {
        format!("{}/browse/{}", self.base_url, issue_key)
    }
}

/// Credentials a connection uses to call Jira on the user's behalf.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// OAuth access token or personal access token.
    Bearer { token: String },
    /// Jira Cloud email + API token.
    Basic { username: String, api_token: String },
}

impl Credentials {
    /// Returns true if no usable secret is present.
    pub fn is_empty(&self) -> bool {
        match self {
            Credentials::Bearer { token } => token.is_empty(),
            Credentials::Basic { username, api_token } => username.is_empty() || api_token.is_empty(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// The reason a user is being sent a direct message.
///
/// The declaration order is the order settings are displayed in and the
/// order used to break ties when one person qualifies under several roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationRole {
    /// The user is (or just became) the issue's assignee.
    Assignee,
    /// The user was mentioned in a comment.
    Mention,
    /// The user reported the issue.
    Reporter,
    /// The user watches the issue.
    Watching,
}

impl NotificationRole {
    pub const ALL: [NotificationRole; 4] = [
        NotificationRole::Assignee,
        NotificationRole::Mention,
        NotificationRole::Reporter,
        NotificationRole::Watching,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationRole::Assignee => "assignee",
            NotificationRole::Mention => "mention",
            NotificationRole::Reporter => "reporter",
            NotificationRole::Watching => "watching",
        }
    }
}

impl fmt::Display for NotificationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown notification role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for NotificationRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A user's direct-message preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Legacy all-or-nothing switch, used for roles without an explicit setting.
    #[serde(default)]
    pub notifications: bool,

    #[serde(default)]
    pub roles_for_dm_notification: BTreeMap<NotificationRole, bool>,
}

impl ConnectionSettings {
    /// Creates settings with the legacy switch on and no per-role overrides.
    pub fn enabled() -> Self {
        ConnectionSettings {
            notifications: true,
            roles_for_dm_notification: BTreeMap::new(),
        }
    }

    /// Returns whether a direct message for `role` should be delivered.
    pub fn should_receive(&self, role: NotificationRole) -> bool {
        if let Some(&on) = self.roles_for_dm_notification.get(&role) {
            return on;
        }
        match role {
            NotificationRole::Watching => false,
            _ => self.notifications,
        }
    }

    /// Records a per-role preference by name.
    ///
    /// Returns false, leaving the settings untouched, if `role` is not a
    /// known role name.
    pub fn set_role(&mut self, role: &str, on: bool) -> bool {
        match role.parse::<NotificationRole>() {
            Ok(role) => {
                self.roles_for_dm_notification.insert(role, on);
                true
            }
            Err(_) => false,
        }
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = NotificationRole::ALL
            .iter()
            .map(|role| {
                let value = if self.should_receive(*role) { "on" } else { "off" };
                format!("\t- Notifications for {}: {}", role, value)
            })
            .collect();
        f.write_str(&lines.join(" \n"))
    }
}

/// A Mattermost user's binding to a Jira instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The user's identity on the Jira side.
    pub account_id: AccountId,

    #[serde(default)]
    pub display_name: String,

    pub credentials: Credentials,

    #[serde(default)]
    pub settings: ConnectionSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_roles(on: bool) -> ConnectionSettings {
        ConnectionSettings {
            notifications: on,
            roles_for_dm_notification: NotificationRole::ALL.into_iter().map(|r| (r, on)).collect(),
        }
    }

    #[test]
    fn settings_display_all_on() {
        assert_eq!(
            all_roles(true).to_string(),
            "\t- Notifications for assignee: on \n\t- Notifications for mention: on \n\t- Notifications for reporter: on \n\t- Notifications for watching: on"
        );
    }

    #[test]
    fn settings_display_all_off() {
        assert_eq!(
            all_roles(false).to_string(),
            "\t- Notifications for assignee: off \n\t- Notifications for mention: off \n\t- Notifications for reporter: off \n\t- Notifications for watching: off"
        );
    }

    #[test]
    fn explicit_role_setting_wins_over_legacy_switch() {
        let mut settings = ConnectionSettings::enabled();
        assert!(settings.should_receive(NotificationRole::Mention));

        assert!(settings.set_role("mention", false));
        assert!(!settings.should_receive(NotificationRole::Mention));
        assert!(settings.should_receive(NotificationRole::Assignee));
    }

    #[test]
    fn watching_defaults_off() {
        let settings = ConnectionSettings::enabled();
        assert!(!settings.should_receive(NotificationRole::Watching));
    }

    #[test]
    fn set_role_rejects_unknown_names() {
        let mut settings = ConnectionSettings::default();
        assert!(!settings.set_role("owner", true));
        assert!(settings.roles_for_dm_notification.is_empty());
    }

    #[test]
    fn role_parse_roundtrip() {
        for role in NotificationRole::ALL {
            assert_eq!(role.as_str().parse::<NotificationRole>(), Ok(role));
        }
        assert_eq!(
            "boss".parse::<NotificationRole>(),
            Err(UnknownRole("boss".to_string()))
        );
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = Credentials::Basic {
            username: "me@example.com".to_string(),
            api_token: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("me@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn instance_trims_trailing_slash() {
        let instance = Instance::new("jira", "https://jira.example.com/", InstanceKind::Server);
        assert_eq!(instance.browse_url("PROJ-1"), "https://jira.example.com/browse/PROJ-1");
    }
}
