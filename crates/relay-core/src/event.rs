//! Inbound build event decoding.
//!
//! A build event arrives as base64-encoded UTF-8 JSON. Two payload shapes
//! are accepted: `{"id": "<build id>"}` and the resource-name variant
//! `{"name": "projects/<p>[/locations/<l>]/builds/<id>"}`. When both keys
//! are present `id` wins.

use std::collections::HashMap;
use std::sync::OnceLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded build event. Constructed fresh per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub build_id: String,
    /// Project parsed from a resource name, if the event carried one.
    pub project_id: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn resource_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^projects/(?P<project>[^/]+)(?:/locations/(?P<location>[^/]+))?/builds/(?P<id>[^/]+)$",
        )
        .expect("resource name pattern is valid")
    })
}

impl BuildEvent {
    /// Parse a build resource name such as
    /// `projects/p/locations/global/builds/abc`.
    pub fn from_resource_name(name: &str) -> Result<Self> {
        let caps = resource_name_pattern()
            .captures(name.trim())
            .ok_or_else(|| RelayError::MalformedEvent(format!("bad resource name: {}", name)))?;
        Ok(BuildEvent {
            build_id: caps["id"].to_string(),
            project_id: caps.name("project").map(|m| m.as_str().to_string()),
            location: caps.name("location").map(|m| m.as_str().to_string()),
        })
    }
}

/// Decode a raw base64 event payload into a [`BuildEvent`].
///
/// Any decoding, UTF-8, or JSON failure is a `MalformedEvent`.
pub fn decode_event(raw: &[u8]) -> Result<BuildEvent> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Err(RelayError::MalformedEvent("empty payload".to_string()));
    }

    let bytes = PAYLOAD_ENGINE
        .decode(trimmed)
        .map_err(|e| RelayError::MalformedEvent(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| RelayError::MalformedEvent(format!("invalid UTF-8: {}", e)))?;
    let body: EventBody = serde_json::from_str(&text)
        .map_err(|e| RelayError::MalformedEvent(format!("invalid JSON: {}", e)))?;

    match (body.id, body.name) {
        (Some(id), _) if !id.trim().is_empty() => Ok(BuildEvent {
            build_id: id.trim().to_string(),
            project_id: None,
            location: None,
        }),
        (_, Some(name)) => BuildEvent::from_resource_name(&name),
        _ => Err(RelayError::MalformedEvent(
            "event carries neither a build id nor a resource name".to_string(),
        )),
    }
}

/// Message wrapper used by push-style event delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub data: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Envelope posted by the event host to the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

impl PushEnvelope {
    /// Parse an envelope body and return its encoded event payload.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| RelayError::MalformedEvent(format!("invalid push envelope: {}", e)))
    }

    pub fn payload(&self) -> &[u8] {
        self.message.data.as_bytes()
    }
}
