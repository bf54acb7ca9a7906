//! Cloud Build REST adapter

use async_trait::async_trait;
use relay_ports::{BuildProvider, PortError, PortResult, RawBuild};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::client::{check_status, endpoint, parse_base};
use crate::token::AccessTokenSource;

pub const DEFAULT_CLOUDBUILD_URL: &str = "https://cloudbuild.googleapis.com";

const SERVICE: &str = "cloudbuild";

/// Looks up builds through `GET v1/projects/{project}/builds/{id}`.
#[derive(Debug, Clone)]
pub struct CloudBuildClient {
    http: reqwest::Client,
    base: Url,
    tokens: AccessTokenSource,
}

impl CloudBuildClient {
    pub fn new(http: reqwest::Client, tokens: AccessTokenSource) -> PortResult<Self> {
        Self::with_base_url(http, tokens, DEFAULT_CLOUDBUILD_URL)
    }

    pub fn with_base_url(
        http: reqwest::Client,
        tokens: AccessTokenSource,
        base: &str,
    ) -> PortResult<Self> {
        Ok(CloudBuildClient {
            http,
            base: parse_base(SERVICE, base)?,
            tokens,
        })
    }
}

#[async_trait]
impl BuildProvider for CloudBuildClient {
    async fn get_build(&self, build_id: &str, project_id: &str) -> PortResult<Option<RawBuild>> {
        let url = endpoint(
            SERVICE,
            &self.base,
            &["v1", "projects", project_id, "builds", build_id],
        )?;
        debug!(%url, "fetching build");

        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PortError::transport(SERVICE, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let build: RawBuild = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::invalid_response(SERVICE, e))?;
        Ok(Some(build))
    }
}
