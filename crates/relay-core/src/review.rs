//! Pull request comment trigger (secondary action).
//!
//! After a successful notification, a build triggered by a pull request
//! whose metadata document reported an application version gets a comment
//! on that pull request stating the deployed version.

use relay_ports::{CommentRequest, ReviewCommentApi, SecretStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{RelayConfig, ReservedKey};
use crate::error::{RelayError, Result};
use crate::metadata::MetadataDocument;
use crate::record::BuildRecord;

/// What happened on the comment path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum CommentOutcome {
    /// Prerequisites not met; nothing attempted.
    Skipped,
    Posted,
    /// Attempted and failed. The primary notification still stands.
    Failed(String),
}

/// Comment text for a deployed version.
pub fn comment_body(record: &BuildRecord, version: &str) -> String {
    format!(
        "Build `{}` finished with status {}; deployed version `{}`.",
        record.id, record.status, version
    )
}

fn resolve_repository(repo: &str, owner: Option<&str>) -> Option<String> {
    if repo.contains('/') {
        return Some(repo.trim_matches('/').to_string());
    }
    owner
        .map(|o| o.trim_matches('/'))
        .filter(|o| !o.is_empty())
        .map(|o| format!("{}/{}", o, repo))
}

/// Decide whether a comment is due and, if so, what to post.
///
/// `metadata` must be the document fetched for this invocation: a version
/// that only exists in the provider's substitutions does not count.
pub fn plan_comment(
    record: &BuildRecord,
    metadata: Option<&MetadataDocument>,
    config: &RelayConfig,
) -> Option<CommentRequest> {
    let keys = &config.keys;

    let event = keys.lookup(record, ReservedKey::ReviewEvent)?;
    if !event.eq_ignore_ascii_case(&config.review.trigger_event) {
        return None;
    }

    let version = metadata?.get(&keys.key(ReservedKey::AppVersion))?;

    if config.review.secret_name.is_none() {
        debug!(build_id = %record.id, "review secret not configured, skipping comment");
        return None;
    }

    let issue_number = match keys
        .lookup(record, ReservedKey::IssueNumber)
        .and_then(|n| n.trim().parse::<u64>().ok())
    {
        Some(n) if n > 0 => n,
        _ => {
            debug!(build_id = %record.id, "pull request number missing or invalid, skipping comment");
            return None;
        }
    };

    let Some(repository) = keys
        .lookup(record, ReservedKey::Repository)
        .and_then(|repo| resolve_repository(repo, config.review.owner.as_deref()))
    else {
        debug!(build_id = %record.id, "repository could not be resolved, skipping comment");
        return None;
    };

    Some(CommentRequest {
        repository,
        issue_number,
        body: comment_body(record, &version),
    })
}

/// Fetch the credential and post the comment.
///
/// Every failure is a `SecondaryAction` error.
pub async fn post_review_comment(
    secrets: &dyn SecretStore,
    api: &dyn ReviewCommentApi,
    secret_name: &str,
    request: &CommentRequest,
) -> Result<()> {
    let credential = secrets
        .latest_secret_version(secret_name)
        .await
        .map_err(|e| RelayError::SecondaryAction(format!("reading secret {}: {}", secret_name, e)))?;
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(RelayError::SecondaryAction(format!(
            "secret {} is empty",
            secret_name
        )));
    }

    api.post_comment(request, credential).await.map_err(|e| {
        RelayError::SecondaryAction(format!(
            "posting to {}#{}: {}",
            request.repository, request.issue_number, e
        ))
    })
}
