//! REST client seams and their reqwest-backed implementations.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::error::ApiError;
use crate::types::{Connection, Credentials, Instance};

/// Reads from the Jira REST API on behalf of one connected user.
pub trait RestClient: Send + Sync {
    /// GETs `path` and returns the decoded JSON body.
    ///
    /// Absolute URLs (such as a resource's `self` link) are used as-is when
    /// they lie under the instance base URL; relative paths resolve under
    /// `<base_url>/rest/api/`.
    fn rest_get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Hands out clients scoped to a connection's credentials.
pub trait ClientFactory: Send + Sync {
    type Client: RestClient;

    /// Returns a client acting as `connection` against `instance`.
    ///
    /// Fails with a `PermissionDenied` error when the connection carries no
    /// usable credentials.
    fn get_client(
        &self,
        instance: &Instance,
        connection: &Connection,
    ) -> Result<Self::Client, ApiError>;
}

/// Resolves a request path against an instance base URL.
///
/// Absolute URLs must point inside the instance; anything else is refused
/// so credentials never leave for a host named in a payload.
pub fn resolve_url(base_url: &str, path: &str) -> Result<String, ApiError> {
    let base = base_url.trim_end_matches('/');
    if path.starts_with("https://") || path.starts_with("http://") {
        let inside = path
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if !inside {
            return Err(ApiError::permanent(format!(
                "refusing request outside {}: {}",
                base, path
            )));
        }
        return Ok(path.to_string());
    }
    Ok(format!("{}/rest/api/{}", base, path.trim_start_matches('/')))
}

/// Builds [`HttpRestClient`]s sharing one connection pool.
#[derive(Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jira-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = HttpRestClient;

    fn get_client(
        &self,
        instance: &Instance,
        connection: &Connection,
    ) -> Result<HttpRestClient, ApiError> {
        if connection.credentials.is_empty() {
            return Err(ApiError::permission_denied(format!(
                "connection for {} on {} has no credentials",
                connection.account_id, instance.id
            )));
        }
        Ok(HttpRestClient {
            http: self.http.clone(),
            base_url: instance.base_url.clone(),
            credentials: connection.credentials.clone(),
        })
    }
}

/// A Jira REST client authenticated as one user.
#[derive(Clone)]
pub struct HttpRestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl RestClient for HttpRestClient {
    async fn rest_get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = resolve_url(&self.base_url, path)?;
        debug!(url = %url, "Jira GET");

        let request = self.http.get(&url).query(query);
        let request = match &self.credentials {
            Credentials::Bearer { token } => request.bearer_auth(token),
            Credentials::Basic { username, api_token } => {
                request.basic_auth(username, Some(api_token))
            }
        };

        let response = request.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        response.json::<Value>().await.map_err(ApiError::from_reqwest)
    }
}

impl std::fmt::Debug for HttpRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRestClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
