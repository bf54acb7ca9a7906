//! Process configuration and the composition root.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use relay_core::{AllowList, AttachmentFields, Collaborators, Relay, RelayConfig, ReviewConfig};
use relay_http::{
    build_http_client, AccessTokenSource, CloudBuildClient, GcsObjectStore, GitHubCommentClient,
    SecretManagerClient, SlackWebhook, DEFAULT_CLOUDBUILD_URL, DEFAULT_GITHUB_API_URL,
    DEFAULT_SECRETMANAGER_URL, DEFAULT_STORAGE_URL,
};

/// Settings read from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Chat incoming-webhook URL
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: String,

    /// Project every build lookup is scoped to
    #[arg(long, env = "BUILD_PROJECT_ID")]
    pub project_id: String,

    /// Secret holding the GitHub token; comments are disabled without it
    #[arg(long, env = "GITHUB_SECRET_NAME")]
    pub github_secret_name: Option<String>,

    /// Owner used to qualify bare repository names
    #[arg(long, env = "GITHUB_OWNER")]
    pub github_owner: Option<String>,

    /// Comma-separated statuses that produce a notification
    #[arg(
        long,
        env = "NOTIFY_STATUSES",
        default_value = "QUEUED,WORKING,SUCCESS,FAILURE,INTERNAL_ERROR,TIMEOUT"
    )]
    pub statuses: AllowList,

    /// Fields on the log attachment: none, status, or reserved
    #[arg(long, env = "ATTACHMENT_FIELDS", default_value = "none")]
    pub attachment_fields: AttachmentFields,

    /// Static OAuth token for Google APIs (default: instance metadata server)
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "CLOUDBUILD_URL", default_value = DEFAULT_CLOUDBUILD_URL)]
    pub cloudbuild_url: String,

    #[arg(long, env = "STORAGE_URL", default_value = DEFAULT_STORAGE_URL)]
    pub storage_url: String,

    #[arg(long, env = "SECRETMANAGER_URL", default_value = DEFAULT_SECRETMANAGER_URL)]
    pub secretmanager_url: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Settings {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::new(self.project_id.trim())
            .with_statuses(self.statuses.clone())
            .with_attachment_fields(self.attachment_fields)
            .with_review(ReviewConfig {
                secret_name: non_blank(&self.github_secret_name),
                owner: non_blank(&self.github_owner),
                ..ReviewConfig::default()
            })
    }

    /// Construct every HTTP collaborator once for the process.
    pub fn collaborators(&self) -> Result<Collaborators> {
        let http = build_http_client()?;
        let tokens = match non_blank(&self.access_token) {
            Some(token) => AccessTokenSource::Static(token),
            None => AccessTokenSource::metadata_server(http.clone())?,
        };

        Ok(Collaborators {
            builds: Arc::new(
                CloudBuildClient::with_base_url(http.clone(), tokens.clone(), &self.cloudbuild_url)
                    .context("Invalid build service URL")?,
            ),
            objects: Arc::new(
                GcsObjectStore::with_base_url(http.clone(), tokens.clone(), &self.storage_url)
                    .context("Invalid storage URL")?,
            ),
            secrets: Arc::new(
                SecretManagerClient::with_base_url(
                    http.clone(),
                    tokens,
                    self.project_id.trim(),
                    &self.secretmanager_url,
                )
                .context("Invalid secret manager URL")?,
            ),
            messaging: Arc::new(
                SlackWebhook::new(http.clone(), &self.slack_webhook_url)
                    .context("Invalid SLACK_WEBHOOK_URL")?,
            ),
            comments: Arc::new(
                GitHubCommentClient::with_base_url(http, &self.github_api_url)
                    .context("Invalid GitHub API URL")?,
            ),
        })
    }

    pub fn build_relay(&self) -> Result<Relay> {
        Relay::new(self.relay_config(), self.collaborators()?)
            .context("Invalid relay configuration")
    }
}
