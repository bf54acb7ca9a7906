//! HTTP push endpoint.
//!
//! The event host redelivers on any non-2xx answer, so only failures that a
//! retry can fix map to 5xx. A malformed event is answered with 400.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use relay_core::{PushEnvelope, Relay, RelayError};
use tracing::{debug, error, info, warn};

pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/", post(receive))
        .route("/healthz", get(healthz))
        .with_state(Arc::new(relay))
}

pub async fn serve(relay: Relay, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("buildrelayd listening on {}", bind);

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive(State(relay): State<Arc<Relay>>, body: Bytes) -> StatusCode {
    let envelope = match PushEnvelope::parse(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "Rejecting push delivery");
            return status_for(&err);
        }
    };
    if let Some(message_id) = envelope.message.message_id.as_deref() {
        debug!(%message_id, "Push delivery received");
    }

    match relay.handle(envelope.payload()).await {
        Ok(_) => StatusCode::NO_CONTENT,
        Err(err) => {
            error!(error = %err, "Relay failed");
            status_for(&err)
        }
    }
}

fn status_for(err: &RelayError) -> StatusCode {
    match err {
        RelayError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
        e if e.is_fatal() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::NO_CONTENT,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use relay_core::{Collaborators, RelayConfig};
    use relay_ports::fakes::{
        MemoryBuildProvider, MemoryObjectStore, MemorySecretStore, RecordingChannel,
        RecordingCommentApi,
    };
    use relay_ports::{PortError, RawBuild};

    struct Fixture {
        builds: Arc<MemoryBuildProvider>,
        channel: Arc<RecordingChannel>,
        relay: Arc<Relay>,
    }

    fn fixture() -> Fixture {
        let builds = Arc::new(MemoryBuildProvider::new());
        let channel = Arc::new(RecordingChannel::new());
        let relay = Relay::new(
            RelayConfig::new("ci-project"),
            Collaborators {
                builds: builds.clone(),
                objects: Arc::new(MemoryObjectStore::new()),
                secrets: Arc::new(MemorySecretStore::new()),
                messaging: channel.clone(),
                comments: Arc::new(RecordingCommentApi::new()),
            },
        )
        .unwrap();
        Fixture {
            builds,
            channel,
            relay: Arc::new(relay),
        }
    }

    fn envelope_for(id: &str) -> Bytes {
        let data = STANDARD.encode(format!(r#"{{"id":"{}"}}"#, id));
        Bytes::from(format!(
            r#"{{"message":{{"data":"{}","messageId":"m-1"}},"subscription":"projects/p/subscriptions/s"}}"#,
            data
        ))
    }

    fn build(id: &str, status: &str) -> RawBuild {
        RawBuild {
            id: id.to_string(),
            status: status.to_string(),
            log_url: Some(format!("https://logs/{}", id)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivered_event_is_no_content() {
        let f = fixture();
        f.builds.insert("ci-project", build("b1", "SUCCESS"));

        let status = receive(State(f.relay.clone()), envelope_for("b1")).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(f.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn filtered_event_is_no_content() {
        let f = fixture();
        f.builds.insert("ci-project", build("b1", "CANCELLED"));

        let status = receive(State(f.relay.clone()), envelope_for("b1")).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(f.channel.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_envelope_and_payload_are_bad_request() {
        let f = fixture();

        let status = receive(State(f.relay.clone()), Bytes::from_static(b"not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = receive(
            State(f.relay.clone()),
            Bytes::from_static(br#"{"message":{"data":"!!!"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_build_is_server_error() {
        let f = fixture();

        let status = receive(State(f.relay.clone()), envelope_for("missing")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn delivery_failure_is_server_error() {
        let f = fixture();
        f.builds.insert("ci-project", build("b1", "FAILURE"));
        f.channel.fail_with(PortError::Status {
            service: "slack".to_string(),
            status: 500,
            body: "boom".to_string(),
        });

        let status = receive(State(f.relay.clone()), envelope_for("b1")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_fatal_errors_do_not_trigger_redelivery() {
        assert_eq!(
            status_for(&RelayError::SecondaryAction("x".to_string())),
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            status_for(&RelayError::Config("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        assert_eq!(healthz().await, "ok");
    }
}
