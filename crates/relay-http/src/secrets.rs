//! Secret Manager adapter

use async_trait::async_trait;
use base64::Engine as _;
use relay_ports::{PortError, PortResult, SecretStore};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::client::{check_status, endpoint, parse_base};
use crate::token::AccessTokenSource;

pub const DEFAULT_SECRETMANAGER_URL: &str = "https://secretmanager.googleapis.com";

const SERVICE: &str = "secretmanager";

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Reads `versions/latest` of a secret.
///
/// Names may be bare (`gh-token`), qualified with the project configured on
/// the client, or already full resource names (`projects/p/secrets/gh-token`).
#[derive(Debug, Clone)]
pub struct SecretManagerClient {
    http: reqwest::Client,
    base: Url,
    project_id: String,
    tokens: AccessTokenSource,
}

impl SecretManagerClient {
    pub fn new(
        http: reqwest::Client,
        tokens: AccessTokenSource,
        project_id: &str,
    ) -> PortResult<Self> {
        Self::with_base_url(http, tokens, project_id, DEFAULT_SECRETMANAGER_URL)
    }

    pub fn with_base_url(
        http: reqwest::Client,
        tokens: AccessTokenSource,
        project_id: &str,
        base: &str,
    ) -> PortResult<Self> {
        Ok(SecretManagerClient {
            http,
            base: parse_base(SERVICE, base)?,
            project_id: project_id.to_string(),
            tokens,
        })
    }

    /// Full resource name for a secret, without any version suffix.
    ///
    /// A versioned name (`.../secrets/gh-token/versions/3`) is reduced to the
    /// secret itself; the latest version is always read.
    pub fn resource_name(&self, name: &str) -> String {
        let name = name.trim().trim_end_matches('/');
        let name = match name.find("/versions/") {
            Some(at) => {
                debug!(secret = %name, "ignoring version suffix, reading latest");
                &name[..at]
            }
            None => name,
        };
        if name.starts_with("projects/") {
            name.to_string()
        } else {
            format!("projects/{}/secrets/{}", self.project_id, name)
        }
    }

    fn access_url(&self, name: &str) -> PortResult<Url> {
        let resource = self.resource_name(name);
        let mut segments: Vec<&str> = vec!["v1"];
        segments.extend(resource.split('/'));
        segments.extend(["versions", "latest:access"]);
        endpoint(SERVICE, &self.base, &segments)
    }
}

fn decode_payload(data: &str) -> PortResult<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| PortError::invalid_response(SERVICE, format!("payload is not base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| PortError::invalid_response(SERVICE, "payload is not UTF-8"))
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn latest_secret_version(&self, name: &str) -> PortResult<String> {
        let url = self.access_url(name)?;
        debug!(secret = %self.resource_name(name), "accessing secret");

        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PortError::transport(SERVICE, e))?;
        let access: AccessResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::invalid_response(SERVICE, e))?;
        decode_payload(&access.payload.data)
    }
}
