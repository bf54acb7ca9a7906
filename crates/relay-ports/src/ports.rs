//! Collaborator trait definitions for buildrelay
//!
//! These traits define every external system the pipeline consumes:
//! - `BuildProvider`: build status lookup by id and project scope
//! - `ObjectStore`: existence check and download of metadata documents
//! - `SecretStore`: latest version of a named secret
//! - `MessagingChannel`: delivery of a formatted notification
//! - `ReviewCommentApi`: comment on a code-review request
//!
//! All traits are async and transport-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PortError;

/// Result type for collaborator calls
pub type PortResult<T> = std::result::Result<T, PortError>;

// ---------------------------------------------------------------------------
// BuildProvider: canonical build state
// ---------------------------------------------------------------------------

/// Build resource as returned by the build status provider.
///
/// Field names follow the provider's JSON (camelCase). Everything except
/// `id` and `status` may be missing; normalisation happens in the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBuild {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<RawArtifacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<String>,
}

/// Artifact section of a provider build resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Build status provider.
///
/// Returns `Ok(None)` when the provider answers but has no such build.
#[async_trait]
pub trait BuildProvider: Send + Sync {
    /// Look up a build by id within a fixed project scope.
    async fn get_build(&self, build_id: &str, project_id: &str) -> PortResult<Option<RawBuild>>;
}

// ---------------------------------------------------------------------------
// ObjectStore: side-channel metadata
// ---------------------------------------------------------------------------

/// Object storage lookup.
///
/// `exists` and `download` fail independently of non-existence: a missing
/// object is `Ok(false)`, a failed call is `Err`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    async fn exists(&self, bucket: &str, path: &str) -> PortResult<bool>;

    /// Download an object's bytes.
    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// SecretStore
// ---------------------------------------------------------------------------

/// Secret retrieval.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the payload of the latest version of a secret.
    async fn latest_secret_version(&self, name: &str) -> PortResult<String>;
}

// ---------------------------------------------------------------------------
// MessagingChannel: primary notification
// ---------------------------------------------------------------------------

/// A single structured field inside an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

/// Attachment block linking to the build logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(default)]
    pub fields: Vec<AttachmentField>,
}

/// Outbound chat message, serialised in incoming-webhook shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub text: String,
    pub mrkdwn: bool,
    pub attachments: Vec<Attachment>,
}

impl NotificationPayload {
    /// Link of the first attachment, if any.
    pub fn title_link(&self) -> Option<&str> {
        self.attachments
            .first()
            .and_then(|a| a.title_link.as_deref())
    }
}

/// Messaging channel.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Deliver a notification. No internal retry.
    async fn send(&self, payload: &NotificationPayload) -> PortResult<()>;
}

// ---------------------------------------------------------------------------
// ReviewCommentApi: secondary action
// ---------------------------------------------------------------------------

/// A comment to post on a code-review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRequest {
    /// `owner/name` form
    pub repository: String,
    pub issue_number: u64,
    pub body: String,
}

/// Code-review comment endpoint.
#[async_trait]
pub trait ReviewCommentApi: Send + Sync {
    /// Post a comment authenticated with a bearer credential.
    async fn post_comment(&self, request: &CommentRequest, credential: &str) -> PortResult<()>;
}
