//! Cloud Storage JSON API adapter

use async_trait::async_trait;
use relay_ports::{ObjectStore, PortError, PortResult};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::client::{check_status, endpoint, parse_base};
use crate::token::AccessTokenSource;

pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";

const SERVICE: &str = "storage";

/// Object lookups against `storage/v1/b/{bucket}/o/{object}`.
///
/// The object path is sent as a single encoded segment, so nested paths
/// like `proj/b1.json` are addressed correctly.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    http: reqwest::Client,
    base: Url,
    tokens: AccessTokenSource,
}

impl GcsObjectStore {
    pub fn new(http: reqwest::Client, tokens: AccessTokenSource) -> PortResult<Self> {
        Self::with_base_url(http, tokens, DEFAULT_STORAGE_URL)
    }

    pub fn with_base_url(
        http: reqwest::Client,
        tokens: AccessTokenSource,
        base: &str,
    ) -> PortResult<Self> {
        Ok(GcsObjectStore {
            http,
            base: parse_base(SERVICE, base)?,
            tokens,
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> PortResult<Url> {
        endpoint(
            SERVICE,
            &self.base,
            &["storage", "v1", "b", bucket, "o", path],
        )
    }

    async fn get(&self, url: Url) -> PortResult<reqwest::Response> {
        let token = self.tokens.token().await?;
        self.http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PortError::transport(SERVICE, e))
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn exists(&self, bucket: &str, path: &str) -> PortResult<bool> {
        let url = self.object_url(bucket, path)?;
        debug!(%bucket, %path, "checking object");
        let response = self.get(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(SERVICE, response).await?;
        Ok(true)
    }

    async fn download(&self, bucket: &str, path: &str) -> PortResult<Vec<u8>> {
        let mut url = self.object_url(bucket, path)?;
        url.query_pairs_mut().append_pair("alt", "media");
        debug!(%bucket, %path, "downloading object");
        let response = check_status(SERVICE, self.get(url).await?).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::transport(SERVICE, e))?;
        Ok(bytes.to_vec())
    }
}
