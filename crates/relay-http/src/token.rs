//! OAuth access tokens for Google APIs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_ports::{PortError, PortResult};
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::{check_status, parse_base};

/// Token endpoint of the instance metadata server.
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const SERVICE: &str = "metadata-server";

/// A cached token is refreshed this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// A metadata-server token and the moment it should be refreshed.
pub struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("refresh_at", &self.refresh_at)
            .finish_non_exhaustive()
    }
}

/// Where bearer tokens for Google APIs come from.
///
/// Clones share one token cache, so every adapter built from the same
/// source reuses a metadata-server token until it nears expiry.
#[derive(Debug, Clone)]
pub enum AccessTokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The metadata server of the host the relay runs on.
    MetadataServer {
        http: reqwest::Client,
        url: Url,
        cache: Arc<Mutex<Option<CachedToken>>>,
    },
}

impl AccessTokenSource {
    pub fn metadata_server(http: reqwest::Client) -> PortResult<Self> {
        Self::metadata_server_at(http, DEFAULT_METADATA_TOKEN_URL)
    }

    pub fn metadata_server_at(http: reqwest::Client, url: &str) -> PortResult<Self> {
        Ok(AccessTokenSource::MetadataServer {
            http,
            url: parse_base(SERVICE, url)?,
            cache: Arc::new(Mutex::new(None)),
        })
    }

    /// Current bearer token.
    pub async fn token(&self) -> PortResult<String> {
        match self {
            AccessTokenSource::Static(token) => Ok(token.clone()),
            AccessTokenSource::MetadataServer { http, url, cache } => {
                // Held across the fetch: one refresh at a time.
                let mut cached = cache.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = fetch_metadata_token(http, url).await?;
                let lifetime = Duration::from_secs(fresh.expires_in);
                if lifetime > REFRESH_MARGIN {
                    *cached = Some(CachedToken {
                        value: fresh.access_token.clone(),
                        refresh_at: Instant::now() + (lifetime - REFRESH_MARGIN),
                    });
                } else {
                    *cached = None;
                }
                Ok(fresh.access_token)
            }
        }
    }
}

async fn fetch_metadata_token(http: &reqwest::Client, url: &Url) -> PortResult<MetadataToken> {
    debug!(url = %url, "requesting access token from metadata server");
    let response = http
        .get(url.clone())
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| PortError::transport(SERVICE, e))?;
    let response = check_status(SERVICE, response).await?;
    let token: MetadataToken = response
        .json()
        .await
        .map_err(|e| PortError::invalid_response(SERVICE, e))?;
    if token.access_token.is_empty() {
        return Err(PortError::Auth {
            service: SERVICE.to_string(),
            message: "empty access token".to_string(),
        });
    }
    Ok(token)
}
