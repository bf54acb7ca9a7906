//! Relay configuration: status allow-list, attachment policy, reserved
//! substitution keys, metadata location, and review-comment settings.
//!
//! Every behaviour that differed between deployed versions of the relay is
//! a value here rather than a branch in the pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::record::{BuildRecord, BuildStatus};

// ── Status allow-list ─────────────────────────────────────────────────────

/// Statuses for which a notification is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList(BTreeSet<BuildStatus>);

impl AllowList {
    pub fn new(statuses: impl IntoIterator<Item = BuildStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    /// Only finished builds: success plus the three adverse outcomes.
    pub fn terminal() -> Self {
        Self::new([
            BuildStatus::Success,
            BuildStatus::Failure,
            BuildStatus::InternalError,
            BuildStatus::Timeout,
        ])
    }

    pub fn contains(&self, status: BuildStatus) -> bool {
        self.0.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = BuildStatus> + '_ {
        self.0.iter().copied()
    }
}

impl Default for AllowList {
    /// Every lifecycle status except `CANCELLED`.
    fn default() -> Self {
        Self::new([
            BuildStatus::Queued,
            BuildStatus::Working,
            BuildStatus::Success,
            BuildStatus::Failure,
            BuildStatus::InternalError,
            BuildStatus::Timeout,
        ])
    }
}

impl FromStr for AllowList {
    type Err = String;

    /// Parse a comma-separated list such as `SUCCESS,FAILURE`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let statuses = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<BuildStatus>)
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        if statuses.is_empty() {
            return Err("status allow-list must not be empty".to_string());
        }
        Ok(Self(statuses))
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(BuildStatus::as_str).collect();
        f.write_str(&names.join(","))
    }
}

// ── Attachment field policy ───────────────────────────────────────────────

/// Which structured fields the log attachment carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentFields {
    /// No fields; the attachment is only a titled link.
    #[default]
    None,
    /// A single "Status" field.
    Status,
    /// One field per reserved substitution present on the build.
    Reserved,
}

impl FromStr for AttachmentFields {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(AttachmentFields::None),
            "status" => Ok(AttachmentFields::Status),
            "reserved" => Ok(AttachmentFields::Reserved),
            other => Err(format!(
                "unknown attachment field policy '{}' (expected none, status, reserved)",
                other
            )),
        }
    }
}

// ── Reserved substitution keys ────────────────────────────────────────────

/// Substitutions the relay reads with a specific meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedKey {
    Repository,
    Branch,
    Commit,
    ReviewEvent,
    IssueNumber,
    AppVersion,
}

impl ReservedKey {
    /// Table order; also the order of reserved attachment fields.
    pub const ALL: [ReservedKey; 6] = [
        ReservedKey::Repository,
        ReservedKey::Branch,
        ReservedKey::Commit,
        ReservedKey::ReviewEvent,
        ReservedKey::IssueNumber,
        ReservedKey::AppVersion,
    ];

    fn default_entry(self) -> KeyEntry {
        let (key, label) = match self {
            ReservedKey::Repository => ("REPO_NAME", "Repository"),
            ReservedKey::Branch => ("BRANCH_NAME", "Branch"),
            ReservedKey::Commit => ("SHORT_SHA", "Commit"),
            ReservedKey::ReviewEvent => ("_EVENT_TYPE", "Event"),
            ReservedKey::IssueNumber => ("_PR_NUMBER", "Pull request"),
            ReservedKey::AppVersion => ("APP_VERSION", "Version"),
        };
        KeyEntry {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// Substitution key and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key: String,
    pub label: String,
}

/// Declarative `{role: (key, label)}` lookup table.
///
/// Roles missing from the table fall back to their built-in entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTable {
    entries: BTreeMap<ReservedKey, KeyEntry>,
}

impl Default for KeyTable {
    fn default() -> Self {
        Self {
            entries: ReservedKey::ALL
                .iter()
                .map(|role| (*role, role.default_entry()))
                .collect(),
        }
    }
}

impl KeyTable {
    /// Replace the entry for one role.
    pub fn with_entry(mut self, role: ReservedKey, key: &str, label: &str) -> Self {
        self.entries.insert(
            role,
            KeyEntry {
                key: key.to_string(),
                label: label.to_string(),
            },
        );
        self
    }

    pub fn entry(&self, role: ReservedKey) -> KeyEntry {
        self.entries
            .get(&role)
            .cloned()
            .unwrap_or_else(|| role.default_entry())
    }

    pub fn key(&self, role: ReservedKey) -> String {
        self.entry(role).key
    }

    pub fn label(&self, role: ReservedKey) -> String {
        self.entry(role).label
    }

    /// Non-empty value of a reserved substitution on `record`.
    pub fn lookup<'a>(&self, record: &'a BuildRecord, role: ReservedKey) -> Option<&'a str> {
        record.substitution(&self.key(role))
    }
}

// ── Metadata location ─────────────────────────────────────────────────────

/// Substitutions that locate a build's metadata document.
///
/// The document lives at `<bucket>/<project>/<build id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataLocation {
    pub bucket_key: String,
    pub project_key: String,
}

impl Default for MetadataLocation {
    fn default() -> Self {
        Self {
            bucket_key: "_METADATA_BUCKET".to_string(),
            project_key: "_METADATA_PROJECT".to_string(),
        }
    }
}

/// Substitution value with surrounding slashes removed; blank counts as absent.
fn qualifier<'a>(record: &'a BuildRecord, key: &str) -> Option<&'a str> {
    record
        .substitution(key)
        .map(|v| v.trim().trim_matches('/'))
        .filter(|v| !v.is_empty())
}

impl MetadataLocation {
    /// `(bucket, object path)` for `record`, or `None` when a qualifier is
    /// missing.
    pub fn resolve(&self, record: &BuildRecord) -> Option<(String, String)> {
        let bucket = qualifier(record, &self.bucket_key)?;
        let project = qualifier(record, &self.project_key)?;
        Some((bucket.to_string(), format!("{}/{}.json", project, record.id)))
    }
}

// ── Review comments ───────────────────────────────────────────────────────

/// Settings for the pull request comment path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Secret holding the review-system token. `None` disables comments.
    pub secret_name: Option<String>,
    /// Owner prefixed to bare repository names.
    pub owner: Option<String>,
    /// Value of the review-event substitution that marks a pull request.
    pub trigger_event: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            secret_name: None,
            owner: None,
            trigger_event: "pull_request".to_string(),
        }
    }
}

// ── RelayConfig ───────────────────────────────────────────────────────────

/// Complete configuration of the relay pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Fixed project scope for build lookups.
    pub project_id: String,
    pub statuses: AllowList,
    pub attachment_fields: AttachmentFields,
    pub keys: KeyTable,
    pub metadata: MetadataLocation,
    pub review: ReviewConfig,
}

impl RelayConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            statuses: AllowList::default(),
            attachment_fields: AttachmentFields::default(),
            keys: KeyTable::default(),
            metadata: MetadataLocation::default(),
            review: ReviewConfig::default(),
        }
    }

    pub fn with_statuses(mut self, statuses: AllowList) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_attachment_fields(mut self, fields: AttachmentFields) -> Self {
        self.attachment_fields = fields;
        self
    }

    pub fn with_review(mut self, review: ReviewConfig) -> Self {
        self.review = review;
        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(RelayError::Config("project id must not be empty".to_string()));
        }
        if self.statuses.is_empty() {
            return Err(RelayError::Config(
                "status allow-list must not be empty".to_string(),
            ));
        }
        if self.metadata.bucket_key.is_empty() || self.metadata.project_key.is_empty() {
            return Err(RelayError::Config(
                "metadata location keys must not be empty".to_string(),
            ));
        }
        if matches!(self.review.secret_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(RelayError::Config(
                "review secret name must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_excludes_cancelled() {
        let list = AllowList::default();
        assert!(list.contains(BuildStatus::Queued));
        assert!(list.contains(BuildStatus::Timeout));
        assert!(!list.contains(BuildStatus::Cancelled));
        assert!(!list.contains(BuildStatus::Unknown));
    }

    #[test]
    fn terminal_allow_list_has_four_statuses() {
        let list = AllowList::terminal();
        assert_eq!(list.iter().count(), 4);
        assert!(!list.contains(BuildStatus::Working));
    }

    #[test]
    fn allow_list_parses_comma_separated() {
        let list: AllowList = " success, FAILURE ,".parse().unwrap();
        assert!(list.contains(BuildStatus::Success));
        assert!(list.contains(BuildStatus::Failure));
        assert_eq!(list.to_string(), "SUCCESS,FAILURE");
    }

    #[test]
    fn allow_list_rejects_unknown_and_empty() {
        assert!("SUCCESS,BOGUS".parse::<AllowList>().is_err());
        assert!(" , ".parse::<AllowList>().is_err());
    }

    #[test]
    fn attachment_policy_parses() {
        assert_eq!("status".parse::<AttachmentFields>(), Ok(AttachmentFields::Status));
        assert_eq!("Reserved".parse::<AttachmentFields>(), Ok(AttachmentFields::Reserved));
        assert_eq!("".parse::<AttachmentFields>(), Ok(AttachmentFields::None));
        assert!("all".parse::<AttachmentFields>().is_err());
    }

    #[test]
    fn key_table_defaults_and_overrides() {
        let table = KeyTable::default();
        assert_eq!(table.key(ReservedKey::Repository), "REPO_NAME");
        assert_eq!(table.label(ReservedKey::IssueNumber), "Pull request");

        let table = table.with_entry(ReservedKey::Repository, "_REPO", "Repo");
        assert_eq!(table.key(ReservedKey::Repository), "_REPO");
    }

    #[test]
    fn metadata_location_requires_both_qualifiers() {
        let location = MetadataLocation::default();
        let mut record = BuildRecord::new("b1", BuildStatus::Success);
        record
            .substitutions
            .insert("_METADATA_BUCKET".to_string(), "meta".to_string());
        assert!(location.resolve(&record).is_none());

        record
            .substitutions
            .insert("_METADATA_PROJECT".to_string(), "web/".to_string());
        assert_eq!(
            location.resolve(&record),
            Some(("meta".to_string(), "web/b1.json".to_string()))
        );
    }

    #[test]
    fn slash_only_qualifier_counts_as_missing() {
        let location = MetadataLocation::default();
        let mut record = BuildRecord::new("b1", BuildStatus::Success);
        record
            .substitutions
            .insert("_METADATA_BUCKET".to_string(), "m".to_string());
        record
            .substitutions
            .insert("_METADATA_PROJECT".to_string(), "/".to_string());
        assert!(location.resolve(&record).is_none());

        record
            .substitutions
            .insert("_METADATA_BUCKET".to_string(), " / ".to_string());
        record
            .substitutions
            .insert("_METADATA_PROJECT".to_string(), "web".to_string());
        assert!(location.resolve(&record).is_none());
    }

    #[test]
    fn validate_rejects_blank_project() {
        assert!(RelayConfig::new("  ").validate().is_err());
        assert!(RelayConfig::new("proj").validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_secret_name() {
        let config = RelayConfig::new("proj").with_review(ReviewConfig {
            secret_name: Some(" ".to_string()),
            ..ReviewConfig::default()
        });
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }
}
