//! Side-channel metadata documents and the merge policy.
//!
//! A build may write a JSON object next to its artifacts. Its entries are
//! merged into the record's substitutions before formatting: non-empty
//! values overwrite, sequences are joined with `", "`, and `null` or empty
//! values never replace an existing substitution.

use std::collections::BTreeMap;

use relay_ports::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::MetadataLocation;
use crate::error::{RelayError, Result};
use crate::obs;
use crate::record::BuildRecord;

/// One metadata value: a scalar string, a list of strings, or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
    Null,
}

impl MetadataValue {
    fn from_json(value: Value) -> Self {
        match value {
            Value::Null => MetadataValue::Null,
            Value::String(s) => MetadataValue::Text(s),
            Value::Array(items) => MetadataValue::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Null => None,
                        Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ),
            other => MetadataValue::Text(other.to_string()),
        }
    }

    /// Value as it is stored in a substitution, or `None` when empty.
    pub fn flatten(&self) -> Option<String> {
        let flat = match self {
            MetadataValue::Text(s) => s.clone(),
            MetadataValue::List(items) => items
                .iter()
                .filter(|item| !item.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            MetadataValue::Null => return None,
        };
        if flat.is_empty() {
            None
        } else {
            Some(flat)
        }
    }
}

/// Open mapping of metadata keys to values; unknown keys pass through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub entries: BTreeMap<String, MetadataValue>,
}

impl MetadataDocument {
    /// Parse a JSON object. Anything other than an object is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RelayError::Enrichment(format!("metadata is not JSON: {}", e)))?;
        match value {
            Value::Object(map) => Ok(Self {
                entries: map
                    .into_iter()
                    .map(|(k, v)| (k, MetadataValue::from_json(v)))
                    .collect(),
            }),
            other => Err(RelayError::Enrichment(format!(
                "metadata must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Flattened, non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).and_then(MetadataValue::flatten)
    }

    /// Merge non-empty entries into `record.substitutions`, overwriting on
    /// collision. Returns the number of keys written.
    pub fn merge_into(&self, record: &mut BuildRecord) -> usize {
        let mut written = 0;
        for (key, value) in &self.entries {
            if let Some(flat) = value.flatten() {
                record.substitutions.insert(key.clone(), flat);
                written += 1;
            }
        }
        written
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Look up the metadata document for `record`.
///
/// `Ok(None)` when the record carries no location or the object does not
/// exist; `Err(Enrichment)` when the store call fails or the document is
/// unreadable.
pub async fn try_fetch_metadata_document(
    store: &dyn ObjectStore,
    location: &MetadataLocation,
    record: &BuildRecord,
) -> Result<Option<MetadataDocument>> {
    let Some((bucket, path)) = location.resolve(record) else {
        debug!(build_id = %record.id, "no metadata location on build");
        return Ok(None);
    };

    let exists = store
        .exists(&bucket, &path)
        .await
        .map_err(|e| RelayError::Enrichment(format!("checking gs://{}/{}: {}", bucket, path, e)))?;
    if !exists {
        debug!(bucket = %bucket, path = %path, "metadata document not found");
        return Ok(None);
    }

    let bytes = store
        .download(&bucket, &path)
        .await
        .map_err(|e| RelayError::Enrichment(format!("downloading gs://{}/{}: {}", bucket, path, e)))?;
    MetadataDocument::from_slice(&bytes).map(Some)
}

/// Best-effort metadata lookup: failures are logged and read as absent.
pub async fn fetch_metadata_document(
    store: &dyn ObjectStore,
    location: &MetadataLocation,
    record: &BuildRecord,
) -> Option<MetadataDocument> {
    match try_fetch_metadata_document(store, location, record).await {
        Ok(doc) => doc,
        Err(err) => {
            obs::emit_enrichment_failed(&record.id, &err);
            None
        }
    }
}
