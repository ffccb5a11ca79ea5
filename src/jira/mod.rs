//! Jira REST access.
//!
//! The relay only ever reads from Jira, and always as a specific connected
//! user: what that user can see is what the relay is allowed to show.

mod client;
mod error;

pub use client::{ClientFactory, HttpClientFactory, HttpRestClient, RestClient, resolve_url};
pub use error::{ApiError, ApiErrorKind};
pub(crate) use error::truncate_for_error;
