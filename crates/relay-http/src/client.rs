//! Shared HTTP plumbing for the adapters.

use relay_ports::{PortError, PortResult};
use reqwest::{Response, StatusCode, Url};

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("buildrelay/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in a `PortError`.
const MAX_ERROR_BODY: usize = 512;

/// Build the process-wide HTTP client.
pub fn build_http_client() -> PortResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| PortError::transport("http-client", e))
}

/// Append path segments to `base`, percent-encoding each one.
///
/// A segment containing `/` stays a single segment (`a/b` becomes `a%2Fb`).
pub(crate) fn endpoint(service: &str, base: &Url, segments: &[&str]) -> PortResult<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| PortError::invalid_response(service, format!("bad base URL {}", base)))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

/// Turn a non-success response into a `PortError`.
pub(crate) async fn check_status(service: &str, response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = truncate(response.text().await.unwrap_or_default());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PortError::Auth {
            service: service.to_string(),
            message: format!("HTTP {}: {}", status.as_u16(), body),
        });
    }
    Err(PortError::Status {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Parse a base URL supplied through configuration.
pub(crate) fn parse_base(service: &str, raw: &str) -> PortResult<Url> {
    Url::parse(raw).map_err(|e| PortError::invalid_response(service, format!("bad URL {}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_slashes_within_segment() {
        let base = Url::parse("https://storage.example/").unwrap();
        let url = endpoint(
            "storage",
            &base,
            &["storage", "v1", "b", "bucket", "o", "web/b1.json"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.example/storage/v1/b/bucket/o/web%2Fb1.json"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("http://127.0.0.1:9000/mock").unwrap();
        let url = endpoint("x", &base, &["v1", "a:access"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/mock/v1/a:access");
    }

    #[test]
    fn endpoint_rejects_non_base_url() {
        let base = Url::parse("mailto:ops@example.com").unwrap();
        assert!(endpoint("x", &base, &["v1"]).is_err());
    }

    #[test]
    fn truncate_limits_body() {
        let long = "x".repeat(2000);
        assert!(truncate(long).len() <= MAX_ERROR_BODY + '…'.len_utf8());
        assert_eq!(truncate("short".to_string()), "short");
    }
}
