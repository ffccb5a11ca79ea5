//! Newtype wrappers for domain identifiers.
//!
//! Jira, Mattermost and the relay itself all identify things with plain
//! strings. These types keep an account id from being passed where a
//! Mattermost user id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_id! {
    /// A registered Jira instance (usually its base URL or an install key).
    InstanceId
}

string_id! {
    /// A Mattermost user id.
    MattermostUserId
}

string_id! {
    /// A Jira user identity.
    ///
    /// Jira Cloud reports an opaque `accountId`; Jira Server reports a
    /// `name`/`key`. Whichever the payload carries ends up here.
    AccountId
}

string_id! {
    /// A Mattermost channel id.
    ChannelId
}

string_id! {
    /// A Jira issue key such as `PROJ-1`.
    IssueKey
}

string_id! {
    /// A Jira comment id.
    CommentId
}

string_id! {
    /// A Mattermost post id returned after a successful post.
    PostId
}

impl IssueKey {
    /// Returns the project key prefix (`PROJ` for `PROJ-1`).
    pub fn project_key(&self) -> &str {
        self.0
            .rsplit_once('-')
            .map(|(project, _)| project)
            .unwrap_or(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod issue_key {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "[A-Z]{2,8}-[0-9]{1,6}") {
                let key = IssueKey::new(&s);
                let json = serde_json::to_string(&key).unwrap();
                let parsed: IssueKey = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(key, parsed);
            }

            #[test]
            fn project_key_is_prefix(project in "[A-Z]{2,8}", n in 1u32..100_000) {
                let key = IssueKey::new(format!("{}-{}", project, n));
                prop_assert_eq!(key.project_key(), project.as_str());
            }
        }

        #[test]
        fn project_key_without_dash_is_whole_key() {
            assert_eq!(IssueKey::new("PROJ").project_key(), "PROJ");
        }
    }

    #[test]
    fn display_is_raw_string() {
        assert_eq!(InstanceId::new("https://jira.example.com").to_string(), "https://jira.example.com");
        assert_eq!(AccountId::new("acct123").to_string(), "acct123");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ChannelId::new("C1")).unwrap();
        assert_eq!(json, "\"C1\"");
    }
}
