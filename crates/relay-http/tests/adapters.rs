//! Adapter tests against a local stand-in server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_http::{
    AccessTokenSource, CloudBuildClient, GcsObjectStore, GitHubCommentClient,
    SecretManagerClient, SlackWebhook,
};
use relay_ports::{
    Attachment, BuildProvider, CommentRequest, MessagingChannel, NotificationPayload,
    ObjectStore, PortError, ReviewCommentApi, SecretStore,
};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Stub {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    fn record(&self, path: String, headers: &HeaderMap, body: Value) {
        self.seen.lock().unwrap().push(Seen {
            path,
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn get_build(
    State(stub): State<Stub>,
    Path((project, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record(format!("build:{}/{}", project, id), &headers, Value::Null);
    match id.as_str() {
        "b1" => Ok(Json(json!({
            "id": "b1",
            "status": "SUCCESS",
            "projectId": project,
            "substitutions": {"REPO_NAME": "web"},
            "logUrl": "https://logs/b1"
        }))),
        "broken" => Err(StatusCode::SERVICE_UNAVAILABLE),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn get_object(
    State(stub): State<Stub>,
    Path((bucket, object)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Vec<u8>, StatusCode> {
    stub.record(format!("object:{}/{}", bucket, object), &headers, Value::Null);
    if object != "proj/b1.json" {
        return Err(StatusCode::NOT_FOUND);
    }
    if query.get("alt").map(String::as_str) == Some("media") {
        Ok(br#"{"APP_VERSION":"1.4.0"}"#.to_vec())
    } else {
        Ok(br#"{"name":"proj/b1.json"}"#.to_vec())
    }
}

async fn access_secret(
    State(stub): State<Stub>,
    Path((project, name, version)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record(
        format!("secret:{}/{}/{}", project, name, version),
        &headers,
        Value::Null,
    );
    if name != "gh-token" || version != "latest:access" {
        return Err(StatusCode::NOT_FOUND);
    }
    // base64("ghp_token\n")
    Ok(Json(json!({"name": "x", "payload": {"data": "Z2hwX3Rva2VuCg=="}})))
}

async fn post_comment(
    State(stub): State<Stub>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    stub.record(
        format!("comment:{}/{}#{}", owner, repo, number),
        &headers,
        body,
    );
    if owner == "locked" {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::CREATED
    }
}

async fn webhook(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> &'static str {
    stub.record("hook".to_string(), &headers, body);
    "ok"
}

async fn failing_webhook() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "no_service")
}

async fn metadata_token(
    State(stub): State<Stub>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    stub.record("token".to_string(), &headers, Value::Null);
    match headers.get("metadata-flavor").and_then(|v| v.to_str().ok()) {
        Some("Google") => Ok(Json(
            json!({"access_token": "meta-token", "expires_in": 3599, "token_type": "Bearer"}),
        )),
        _ => Err(StatusCode::FORBIDDEN),
    }
}

async fn short_lived_token(State(stub): State<Stub>, headers: HeaderMap) -> Json<Value> {
    stub.record("short-token".to_string(), &headers, Value::Null);
    Json(json!({"access_token": "short-token", "expires_in": 30, "token_type": "Bearer"}))
}

/// Start the stand-in server and return its base URL.
async fn serve(stub: Stub) -> String {
    let app = Router::new()
        .route("/v1/projects/{project}/builds/{id}", get(get_build))
        .route("/storage/v1/b/{bucket}/o/{object}", get(get_object))
        .route(
            "/v1/projects/{project}/secrets/{name}/versions/{version}",
            get(access_secret),
        )
        .route(
            "/repos/{owner}/{repo}/issues/{number}/comments",
            post(post_comment),
        )
        .route("/hook", post(webhook))
        .route("/gone", post(failing_webhook))
        .route("/token", get(metadata_token))
        .route("/short-token", get(short_lived_token))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn static_token() -> AccessTokenSource {
    AccessTokenSource::Static("test-token".to_string())
}

#[tokio::test]
async fn cloudbuild_fetches_build_with_bearer_token() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let client = CloudBuildClient::with_base_url(reqwest::Client::new(), static_token(), &base).unwrap();

    let build = client.get_build("b1", "proj").await.unwrap().unwrap();

    assert_eq!(build.status, "SUCCESS");
    assert_eq!(build.log_url.as_deref(), Some("https://logs/b1"));
    let seen = stub.seen();
    assert_eq!(seen[0].path, "build:proj/b1");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer test-token"));
}

#[tokio::test]
async fn cloudbuild_missing_build_is_none_and_outage_is_error() {
    let base = serve(Stub::default()).await;
    let client = CloudBuildClient::with_base_url(reqwest::Client::new(), static_token(), &base).unwrap();

    assert!(client.get_build("nope", "proj").await.unwrap().is_none());
    let err = client.get_build("broken", "proj").await.unwrap_err();
    assert!(matches!(err, PortError::Status { status: 503, .. }));
}

#[tokio::test]
async fn storage_checks_and_downloads_nested_object() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let store = GcsObjectStore::with_base_url(reqwest::Client::new(), static_token(), &base).unwrap();

    assert!(store.exists("meta", "proj/b1.json").await.unwrap());
    assert!(!store.exists("meta", "proj/b2.json").await.unwrap());
    let bytes = store.download("meta", "proj/b1.json").await.unwrap();
    assert_eq!(bytes, br#"{"APP_VERSION":"1.4.0"}"#.to_vec());

    assert_eq!(stub.seen()[0].path, "object:meta/proj/b1.json");
}

#[tokio::test]
async fn storage_download_of_missing_object_is_error() {
    let base = serve(Stub::default()).await;
    let store = GcsObjectStore::with_base_url(reqwest::Client::new(), static_token(), &base).unwrap();

    let err = store.download("meta", "proj/b2.json").await.unwrap_err();
    assert!(matches!(err, PortError::Status { status: 404, .. }));
}

#[tokio::test]
async fn secret_manager_decodes_latest_version() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let secrets =
        SecretManagerClient::with_base_url(reqwest::Client::new(), static_token(), "proj", &base)
            .unwrap();

    let value = secrets.latest_secret_version("gh-token").await.unwrap();

    assert_eq!(value, "ghp_token\n");
    assert_eq!(stub.seen()[0].path, "secret:proj/gh-token/latest:access");
}

#[tokio::test]
async fn github_posts_comment_with_credential() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let api = GitHubCommentClient::with_base_url(reqwest::Client::new(), &base).unwrap();
    let request = CommentRequest {
        repository: "acme/web".to_string(),
        issue_number: 42,
        body: "Build `b1` finished with status SUCCESS; deployed version `1.4.0`.".to_string(),
    };

    api.post_comment(&request, "ghp_token").await.unwrap();

    let seen = stub.seen();
    assert_eq!(seen[0].path, "comment:acme/web#42");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer ghp_token"));
    assert_eq!(seen[0].body["body"], request.body.as_str());
}

#[tokio::test]
async fn github_rejection_is_auth_error() {
    let base = serve(Stub::default()).await;
    let api = GitHubCommentClient::with_base_url(reqwest::Client::new(), &base).unwrap();
    let request = CommentRequest {
        repository: "locked/web".to_string(),
        issue_number: 1,
        body: "x".to_string(),
    };

    let err = api.post_comment(&request, "bad").await.unwrap_err();
    assert!(matches!(err, PortError::Auth { .. }));
}

#[tokio::test]
async fn webhook_posts_payload_json() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let hook = SlackWebhook::new(reqwest::Client::new(), &format!("{}/hook", base)).unwrap();
    let payload = NotificationPayload {
        text: "Build b1 - SUCCESS".to_string(),
        mrkdwn: true,
        attachments: vec![Attachment {
            title: "Build logs".to_string(),
            title_link: Some("https://logs/b1".to_string()),
            fields: vec![],
        }],
    };

    hook.send(&payload).await.unwrap();

    let seen = stub.seen();
    assert_eq!(seen[0].body["text"], "Build b1 - SUCCESS");
    assert_eq!(seen[0].body["attachments"][0]["title_link"], "https://logs/b1");
}

#[tokio::test]
async fn webhook_rejection_carries_status_and_body() {
    let base = serve(Stub::default()).await;
    let hook = SlackWebhook::new(reqwest::Client::new(), &format!("{}/gone", base)).unwrap();
    let payload = NotificationPayload {
        text: "x".to_string(),
        mrkdwn: true,
        attachments: vec![],
    };

    let err = hook.send(&payload).await.unwrap_err();
    assert_eq!(
        err,
        PortError::Status {
            service: "slack".to_string(),
            status: 404,
            body: "no_service".to_string(),
        }
    );
}

#[tokio::test]
async fn metadata_server_token_requires_flavor_header() {
    let base = serve(Stub::default()).await;
    let source =
        AccessTokenSource::metadata_server_at(reqwest::Client::new(), &format!("{}/token", base))
            .unwrap();

    assert_eq!(source.token().await.unwrap(), "meta-token");
}

#[tokio::test]
async fn metadata_server_token_is_reused_across_clients() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let http = reqwest::Client::new();
    let tokens =
        AccessTokenSource::metadata_server_at(http.clone(), &format!("{}/token", base)).unwrap();
    let builds = CloudBuildClient::with_base_url(http.clone(), tokens.clone(), &base).unwrap();
    let store = GcsObjectStore::with_base_url(http, tokens.clone(), &base).unwrap();

    builds.get_build("b1", "proj").await.unwrap();
    store.exists("meta", "proj/b1.json").await.unwrap();
    store.download("meta", "proj/b1.json").await.unwrap();

    let token_fetches = stub.seen().iter().filter(|s| s.path == "token").count();
    assert_eq!(token_fetches, 1);
    let seen = stub.seen();
    let object_call = seen.iter().find(|s| s.path.starts_with("object:")).unwrap();
    assert_eq!(object_call.authorization.as_deref(), Some("Bearer meta-token"));
}

#[tokio::test]
async fn short_lived_metadata_token_is_not_cached() {
    let stub = Stub::default();
    let base = serve(stub.clone()).await;
    let source = AccessTokenSource::metadata_server_at(
        reqwest::Client::new(),
        &format!("{}/short-token", base),
    )
    .unwrap();

    assert_eq!(source.token().await.unwrap(), "short-token");
    assert_eq!(source.token().await.unwrap(), "short-token");

    assert_eq!(stub.seen().len(), 2);
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    let client = CloudBuildClient::with_base_url(
        reqwest::Client::new(),
        static_token(),
        "http://127.0.0.1:1",
    )
    .unwrap();

    let err = client.get_build("b1", "proj").await.unwrap_err();
    assert!(matches!(err, PortError::Transport { .. }));
}
