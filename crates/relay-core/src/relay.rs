//! The relay pipeline: decode, fetch, enrich, filter, format, dispatch,
//! and the optional review comment.
//!
//! Steps run strictly in sequence. The primary notification is always sent
//! before the comment path is attempted, and nothing after a successful
//! send can turn the invocation into a failure.

use std::sync::Arc;
use std::time::Instant;

use relay_ports::{BuildProvider, MessagingChannel, ObjectStore, ReviewCommentApi, SecretStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::event::{decode_event, BuildEvent};
use crate::format::format_message;
use crate::metadata::fetch_metadata_document;
use crate::obs;
use crate::record::{fetch_build_record, BuildStatus};
use crate::review::{plan_comment, post_review_comment, CommentOutcome};

/// Constructed-once handles to every external collaborator.
#[derive(Clone)]
pub struct Collaborators {
    pub builds: Arc<dyn BuildProvider>,
    pub objects: Arc<dyn ObjectStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub messaging: Arc<dyn MessagingChannel>,
    pub comments: Arc<dyn ReviewCommentApi>,
}

/// Result of one successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Status not in the allow-list; nothing was sent.
    Filtered {
        build_id: String,
        status: BuildStatus,
    },
    /// Notification sent.
    Delivered {
        build_id: String,
        status: BuildStatus,
        /// Whether a metadata document was merged.
        enriched: bool,
        comment: CommentOutcome,
    },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Filtered { .. } => "filtered",
            Outcome::Delivered { .. } => "delivered",
        }
    }
}

/// Event-to-notification relay.
#[derive(Clone)]
pub struct Relay {
    config: RelayConfig,
    collaborators: Collaborators,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Create a relay. Fails on an invalid configuration.
    pub fn new(config: RelayConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            collaborators,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relay one encoded event inside its own invocation span.
    pub async fn handle(&self, raw: &[u8]) -> Result<Outcome> {
        let invocation_id = Uuid::new_v4().to_string();
        async {
            let event = decode_event(raw)?;
            self.relay_event(event).await
        }
        .instrument(obs::invocation_span(&invocation_id))
        .await
    }

    /// Relay an already decoded event.
    pub async fn relay_event(&self, event: BuildEvent) -> Result<Outcome> {
        let started = Instant::now();
        obs::emit_invocation_started(&event.build_id);

        if let Some(project) = event.project_id.as_deref() {
            if project != self.config.project_id {
                debug!(
                    event_project = %project,
                    configured_project = %self.config.project_id,
                    "event names a different project; using configured scope"
                );
            }
        }

        let outcome = self.run(&event).await;
        let label = match &outcome {
            Ok(o) => o.label(),
            Err(_) => "failed",
        };
        obs::emit_invocation_finished(
            &event.build_id,
            started.elapsed().as_millis() as u64,
            label,
        );
        outcome
    }

    async fn run(&self, event: &BuildEvent) -> Result<Outcome> {
        let c = &self.collaborators;

        let mut record =
            fetch_build_record(c.builds.as_ref(), &event.build_id, &self.config.project_id)
                .await?;

        let metadata =
            fetch_metadata_document(c.objects.as_ref(), &self.config.metadata, &record).await;
        if let Some(doc) = &metadata {
            let written = doc.merge_into(&mut record);
            obs::emit_enrichment_applied(&record.id, written);
        }

        if !self.config.statuses.contains(record.status) {
            obs::emit_invocation_filtered(&record.id, record.status.as_str());
            return Ok(Outcome::Filtered {
                build_id: record.id,
                status: record.status,
            });
        }

        let payload = format_message(&record, &self.config);
        c.messaging
            .send(&payload)
            .await
            .map_err(RelayError::Delivery)?;
        obs::emit_notification_delivered(&record.id, record.status.as_str());

        let comment = match (
            plan_comment(&record, metadata.as_ref(), &self.config),
            self.config.review.secret_name.as_deref(),
        ) {
            (Some(request), Some(secret_name)) => {
                match post_review_comment(
                    c.secrets.as_ref(),
                    c.comments.as_ref(),
                    secret_name,
                    &request,
                )
                .await
                {
                    Ok(()) => {
                        obs::emit_comment_posted(
                            &record.id,
                            &request.repository,
                            request.issue_number,
                        );
                        CommentOutcome::Posted
                    }
                    Err(err) => {
                        obs::emit_comment_failed(&record.id, &err);
                        CommentOutcome::Failed(err.to_string())
                    }
                }
            }
            _ => CommentOutcome::Skipped,
        };

        Ok(Outcome::Delivered {
            build_id: record.id,
            status: record.status,
            enriched: metadata.is_some(),
            comment,
        })
    }
}
