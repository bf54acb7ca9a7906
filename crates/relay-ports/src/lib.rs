//! Relay-Ports: collaborator contracts for buildrelay
//!
//! The notification pipeline talks to five external systems. This crate
//! names each of them as an async trait so the core never depends on a
//! concrete transport, and ships in-memory fakes for tests.
//!
//! ## Key Components
//!
//! - `BuildProvider`: canonical build status lookup
//! - `ObjectStore`: side-channel metadata documents
//! - `SecretStore`: review-system credentials
//! - `MessagingChannel`: chat delivery of `NotificationPayload`
//! - `ReviewCommentApi`: pull request comments

mod error;
pub mod fakes;
pub mod ports;

pub use error::PortError;
pub use ports::{
    Attachment, AttachmentField, BuildProvider, CommentRequest, MessagingChannel,
    NotificationPayload, ObjectStore, PortResult, RawArtifacts, RawBuild, ReviewCommentApi,
    SecretStore,
};
