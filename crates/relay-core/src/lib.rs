//! buildrelay core library
//!
//! Turns one build lifecycle event into a chat notification:
//!
//! ```text
//! event -> decode -> fetch build -> fetch metadata? -> merge -> filter
//!       -> format -> send -> review comment?
//! ```
//!
//! External systems are reached only through the traits in `relay_ports`;
//! this crate owns the decisions and the formatting.

pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod metadata;
pub mod obs;
pub mod record;
pub mod relay;
pub mod review;
pub mod telemetry;

pub use config::{
    AllowList, AttachmentFields, KeyEntry, KeyTable, MetadataLocation, RelayConfig,
    ReservedKey, ReviewConfig,
};
pub use error::{RelayError, Result};
pub use event::{decode_event, BuildEvent, PushEnvelope, PushMessage};
pub use format::{format_message, render_text, LOG_ATTACHMENT_TITLE};
pub use metadata::{
    fetch_metadata_document, try_fetch_metadata_document, MetadataDocument, MetadataValue,
};
pub use record::{fetch_build_record, BuildRecord, BuildStatus};
pub use relay::{Collaborators, Outcome, Relay};
pub use review::{comment_body, plan_comment, post_review_comment, CommentOutcome};
pub use telemetry::{default_directives, init_tracing};

pub use obs::{
    emit_comment_failed, emit_comment_posted, emit_enrichment_applied, emit_enrichment_failed,
    emit_invocation_filtered, emit_invocation_finished, emit_invocation_started,
    emit_notification_delivered, invocation_span,
};

/// buildrelay version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
