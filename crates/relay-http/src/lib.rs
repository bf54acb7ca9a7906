//! Relay-HTTP: reqwest adapters for the buildrelay collaborator ports
//!
//! | Adapter | Port | Remote |
//! |---------|------|--------|
//! | `SlackWebhook` | `MessagingChannel` | Incoming webhook URL |
//! | `CloudBuildClient` | `BuildProvider` | Cloud Build REST v1 |
//! | `GcsObjectStore` | `ObjectStore` | Cloud Storage JSON API |
//! | `SecretManagerClient` | `SecretStore` | Secret Manager v1 |
//! | `GitHubCommentClient` | `ReviewCommentApi` | GitHub REST issues API |
//!
//! Google APIs authenticate through an `AccessTokenSource`: a static token
//! or the instance metadata server.

mod client;
pub mod cloudbuild;
pub mod github;
pub mod secrets;
pub mod slack;
pub mod storage;
pub mod token;

pub use client::{build_http_client, USER_AGENT};
pub use cloudbuild::{CloudBuildClient, DEFAULT_CLOUDBUILD_URL};
pub use github::{GitHubCommentClient, DEFAULT_GITHUB_API_URL};
pub use secrets::{SecretManagerClient, DEFAULT_SECRETMANAGER_URL};
pub use slack::SlackWebhook;
pub use storage::{GcsObjectStore, DEFAULT_STORAGE_URL};
pub use token::{AccessTokenSource, DEFAULT_METADATA_TOKEN_URL};

/// Re-exported so callers can build base URLs without depending on reqwest.
pub use reqwest::Url;
