//! Notification rendering.
//!
//! Turns an enriched [`BuildRecord`] into the chat payload. Pure: no I/O,
//! and the output depends only on the record and the configuration.

use relay_ports::{Attachment, AttachmentField, NotificationPayload};

use crate::config::{AttachmentFields, KeyTable, RelayConfig, ReservedKey};
use crate::record::BuildRecord;

/// Title of the single attachment block.
pub const LOG_ATTACHMENT_TITLE: &str = "Build logs";

/// Render the message text.
///
/// Lines, in order: the repository title (when known), the
/// `Build <id> - <status>` header, one `key: value` line per substitution
/// in key order, and the deduplicated image list (when non-empty).
pub fn render_text(record: &BuildRecord, keys: &KeyTable) -> String {
    let mut lines = Vec::with_capacity(record.substitutions.len() + 3);

    if let Some(repo) = keys.lookup(record, ReservedKey::Repository) {
        lines.push(format!("`{}`", repo));
    }

    lines.push(format!("Build {} - {}", record.id, record.status));

    // BTreeMap iteration is already lexicographic by key.
    for (key, value) in &record.substitutions {
        lines.push(format!("{}: {}", key, value));
    }

    let images = record.image_list();
    if !images.is_empty() {
        lines.push(format!("Images: {}", images.join(", ")));
    }

    lines.join("\n")
}

fn attachment_fields(
    record: &BuildRecord,
    keys: &KeyTable,
    policy: AttachmentFields,
) -> Vec<AttachmentField> {
    match policy {
        AttachmentFields::None => Vec::new(),
        AttachmentFields::Status => vec![AttachmentField {
            title: "Status".to_string(),
            value: record.status.to_string(),
            short: true,
        }],
        AttachmentFields::Reserved => ReservedKey::ALL
            .iter()
            .filter_map(|role| {
                keys.lookup(record, *role).map(|value| AttachmentField {
                    title: keys.label(*role),
                    value: value.to_string(),
                    short: true,
                })
            })
            .collect(),
    }
}

/// Build the full notification payload for `record`.
pub fn format_message(record: &BuildRecord, config: &RelayConfig) -> NotificationPayload {
    NotificationPayload {
        text: render_text(record, &config.keys),
        mrkdwn: true,
        attachments: vec![Attachment {
            title: LOG_ATTACHMENT_TITLE.to_string(),
            title_link: record.log_url.clone(),
            fields: attachment_fields(record, &config.keys, config.attachment_fields),
        }],
    }
}
