//! GitHub issue comment adapter

use async_trait::async_trait;
use relay_ports::{CommentRequest, PortError, PortResult, ReviewCommentApi};
use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use crate::client::{check_status, endpoint, parse_base};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const SERVICE: &str = "github";

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// Posts pull request comments via `POST repos/{owner}/{repo}/issues/{n}/comments`.
#[derive(Debug, Clone)]
pub struct GitHubCommentClient {
    http: reqwest::Client,
    base: Url,
}

impl GitHubCommentClient {
    pub fn new(http: reqwest::Client) -> PortResult<Self> {
        Self::with_base_url(http, DEFAULT_GITHUB_API_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base: &str) -> PortResult<Self> {
        Ok(GitHubCommentClient {
            http,
            base: parse_base(SERVICE, base)?,
        })
    }

    fn comments_url(&self, request: &CommentRequest) -> PortResult<Url> {
        let (owner, repo) = request
            .repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| {
                PortError::invalid_response(
                    SERVICE,
                    format!("repository must be owner/name, got {}", request.repository),
                )
            })?;
        let number = request.issue_number.to_string();
        endpoint(
            SERVICE,
            &self.base,
            &["repos", owner, repo, "issues", &number, "comments"],
        )
    }
}

#[async_trait]
impl ReviewCommentApi for GitHubCommentClient {
    async fn post_comment(&self, request: &CommentRequest, credential: &str) -> PortResult<()> {
        let url = self.comments_url(request)?;
        debug!(
            repository = %request.repository,
            issue = request.issue_number,
            "posting review comment"
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(credential)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&CommentBody {
                body: &request.body,
            })
            .send()
            .await
            .map_err(|e| PortError::transport(SERVICE, e))?;
        check_status(SERVICE, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(repository: &str) -> CommentRequest {
        CommentRequest {
            repository: repository.to_string(),
            issue_number: 42,
            body: "deployed".to_string(),
        }
    }

    #[test]
    fn comments_url_targets_issue() {
        let client = GitHubCommentClient::new(reqwest::Client::new()).unwrap();
        assert_eq!(
            client.comments_url(&request("acme/web")).unwrap().as_str(),
            "https://api.github.com/repos/acme/web/issues/42/comments"
        );
    }

    #[test]
    fn unqualified_repository_is_rejected() {
        let client = GitHubCommentClient::new(reqwest::Client::new()).unwrap();
        assert!(client.comments_url(&request("web")).is_err());
        assert!(client.comments_url(&request("a/b/c")).is_err());
    }
}
