//! Canonical build record and its normalisation from provider responses.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use relay_ports::{BuildProvider, RawBuild};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RelayError, Result};

/// Lifecycle status of a build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Queued,
    Working,
    Success,
    Failure,
    InternalError,
    Timeout,
    Cancelled,
    /// Waiting on approval before being queued.
    Pending,
    /// Queued too long and never started.
    Expired,
    #[serde(rename = "STATUS_UNKNOWN")]
    Unknown,
}

impl BuildStatus {
    pub const ALL: [BuildStatus; 10] = [
        BuildStatus::Queued,
        BuildStatus::Working,
        BuildStatus::Success,
        BuildStatus::Failure,
        BuildStatus::InternalError,
        BuildStatus::Timeout,
        BuildStatus::Cancelled,
        BuildStatus::Pending,
        BuildStatus::Expired,
        BuildStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Queued => "QUEUED",
            BuildStatus::Working => "WORKING",
            BuildStatus::Success => "SUCCESS",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::InternalError => "INTERNAL_ERROR",
            BuildStatus::Timeout => "TIMEOUT",
            BuildStatus::Cancelled => "CANCELLED",
            BuildStatus::Pending => "PENDING",
            BuildStatus::Expired => "EXPIRED",
            BuildStatus::Unknown => "STATUS_UNKNOWN",
        }
    }

    /// Whether the build can no longer change status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildStatus::Success
                | BuildStatus::Failure
                | BuildStatus::InternalError
                | BuildStatus::Timeout
                | BuildStatus::Cancelled
                | BuildStatus::Expired
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        BuildStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("unknown build status: {}", s))
    }
}

/// Canonical state of one build, normalised from the provider.
///
/// `id` and `status` are always present; every collection defaults to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    pub status: BuildStatus,
    pub project_id: Option<String>,
    /// Build parameters, kept in key order.
    pub substitutions: BTreeMap<String, String>,
    /// Images pushed as build artifacts.
    pub artifacts: Vec<String>,
    /// Images declared at the top level of the build.
    pub images: Vec<String>,
    pub log_url: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

fn parse_timestamp(field: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!(field = field, value = %value, error = %e, "ignoring unparseable timestamp");
            None
        }
    }
}

impl BuildRecord {
    /// Create a bare record with no optional fields.
    pub fn new(id: impl Into<String>, status: BuildStatus) -> Self {
        Self {
            id: id.into(),
            status,
            project_id: None,
            substitutions: BTreeMap::new(),
            artifacts: Vec::new(),
            images: Vec::new(),
            log_url: None,
            create_time: None,
            start_time: None,
            finish_time: None,
        }
    }

    /// Normalise a provider response.
    pub fn from_raw(raw: RawBuild) -> Result<Self> {
        let status = raw
            .status
            .parse::<BuildStatus>()
            .map_err(|reason| RelayError::UpstreamLookup {
                build_id: raw.id.clone(),
                reason,
            })?;

        Ok(Self {
            create_time: parse_timestamp("createTime", raw.create_time.as_deref()),
            start_time: parse_timestamp("startTime", raw.start_time.as_deref()),
            finish_time: parse_timestamp("finishTime", raw.finish_time.as_deref()),
            id: raw.id,
            status,
            project_id: raw.project_id,
            substitutions: raw.substitutions.unwrap_or_default().into_iter().collect(),
            artifacts: raw.artifacts.and_then(|a| a.images).unwrap_or_default(),
            images: raw.images.unwrap_or_default(),
            log_url: raw.log_url,
        })
    }

    /// Non-empty substitution value for `key`.
    pub fn substitution(&self, key: &str) -> Option<&str> {
        self.substitutions
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Union of `artifacts` and `images`, first appearance wins.
    pub fn image_list(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.artifacts.len() + self.images.len());
        for image in self.artifacts.iter().chain(self.images.iter()) {
            if !image.is_empty() && !seen.contains(&image.as_str()) {
                seen.push(image.as_str());
            }
        }
        seen
    }

    /// Wall-clock run time, when both ends are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) if finish >= start => Some(finish - start),
            _ => None,
        }
    }
}

/// Fetch and normalise the canonical record for a build.
///
/// A failed call and a missing build are both `UpstreamLookup` errors.
pub async fn fetch_build_record(
    provider: &dyn BuildProvider,
    build_id: &str,
    project_id: &str,
) -> Result<BuildRecord> {
    let raw = provider
        .get_build(build_id, project_id)
        .await
        .map_err(|e| RelayError::UpstreamLookup {
            build_id: build_id.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| RelayError::UpstreamLookup {
            build_id: build_id.to_string(),
            reason: format!("no build in project {}", project_id),
        })?;

    BuildRecord::from_raw(raw)
}
