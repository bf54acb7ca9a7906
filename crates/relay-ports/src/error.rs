//! Error types for collaborator calls

use thiserror::Error;

/// Errors raised by an external collaborator.
///
/// "Not found" is deliberately absent: ports that can miss return `Option`
/// or `bool` instead, so an error always means the call itself failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("Transport failure calling {service}: {message}")]
    Transport { service: String, message: String },

    /// The remote answered with a non-success status
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    /// Credentials were rejected or could not be obtained
    #[error("Authentication failed for {service}: {message}")]
    Auth { service: String, message: String },

    /// Response body did not match the expected shape
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },
}

impl PortError {
    pub fn transport(service: &str, message: impl std::fmt::Display) -> Self {
        PortError::Transport {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_response(service: &str, message: impl std::fmt::Display) -> Self {
        PortError::InvalidResponse {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    /// Name of the collaborator that failed.
    pub fn service(&self) -> &str {
        match self {
            PortError::Transport { service, .. }
            | PortError::Status { service, .. }
            | PortError::Auth { service, .. }
            | PortError::InvalidResponse { service, .. } => service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display_includes_code_and_body() {
        let err = PortError::Status {
            service: "slack".to_string(),
            status: 404,
            body: "no_service".to_string(),
        };
        assert_eq!(err.to_string(), "slack returned HTTP 404: no_service");
        assert_eq!(err.service(), "slack");
    }
}
