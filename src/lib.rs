//! Jira Relay - fans Jira webhook events out to Mattermost.
//!
//! Deliveries are accepted over HTTP, queued, and processed by a fixed pool
//! of workers. Each worker parses the event, completes it from the Jira REST
//! API as the acting user, honors comment visibility restrictions, and posts
//! to every subscribed channel and to the users the event concerns.

pub mod config;
pub mod jira;
pub mod notify;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
