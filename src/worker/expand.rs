//! Completing partially-populated issues.
//!
//! Jira Cloud comment webhooks carry little more than the issue key. Before
//! matching and rendering, the missing fields are fetched and merged in.

use tracing::debug;

use super::outcome::PipelineError;
use crate::jira::RestClient;
use crate::webhooks::{IssueRef, parse_issue_fields};

/// Fields requested when expanding an issue.
const EXPAND_FIELDS: &str =
    "summary,project,issuetype,status,priority,resolution,assignee,reporter,labels,watches,*navigable";

/// Fetches the issue and fills every field that is still missing.
///
/// Returns `Ok(false)` without any request when the issue is already
/// complete, so calling it again after a successful expansion is a no-op.
/// Present fields are never overwritten.
pub async fn expand_issue<C: RestClient>(
    client: &C,
    issue: &mut IssueRef,
) -> Result<bool, PipelineError> {
    if !issue.needs_expansion() {
        return Ok(false);
    }

    let path = format!("2/issue/{}", issue.key);
    debug!(issue = %issue.key, "Expanding issue");
    let body = client
        .rest_get(&path, &[("fields", EXPAND_FIELDS)])
        .await
        .map_err(|e| PipelineError::api("issue expansion", e))?;

    let fetched = parse_issue_fields(body)?;
    issue.fields.fill_missing_from(fetched);
    Ok(true)
}
