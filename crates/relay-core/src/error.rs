//! Error taxonomy for a single relay invocation.

use relay_ports::PortError;

/// Errors produced while relaying one build event.
///
/// Only `MalformedEvent`, `UpstreamLookup`, `Delivery`, and `Config` abort an
/// invocation. `Enrichment` and `SecondaryAction` are logged and recorded in
/// the outcome; the pipeline never returns them.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("build lookup failed for {build_id}: {reason}")]
    UpstreamLookup { build_id: String, reason: String },

    #[error("metadata enrichment failed: {0}")]
    Enrichment(String),

    #[error("notification delivery failed: {0}")]
    Delivery(#[source] PortError),

    #[error("review comment failed: {0}")]
    SecondaryAction(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether this error ends the invocation without a notification.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RelayError::Enrichment(_) | RelayError::SecondaryAction(_)
        )
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
