//! Structured observability hooks for relay invocations.
//!
//! This module provides:
//! - An invocation-scoped tracing span via `invocation_span`
//! - Emission functions for each pipeline step: start, filter, enrichment
//!   failure, delivery, comment result, finish
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! Contained failures are emitted at `warn!`.

use tracing::{info, warn};

/// Span tagging every event of one invocation.
///
/// Attach with `tracing::Instrument` so the pipeline future stays `Send`.
///
/// # Example
///
/// ```ignore
/// relay.run(raw).instrument(invocation_span("0b6f...")).await
/// // every event inside carries invocation_id = "0b6f..."
/// ```
pub fn invocation_span(invocation_id: &str) -> tracing::Span {
    tracing::info_span!("buildrelay.invocation", invocation_id = %invocation_id)
}

/// Emit event: invocation started for a decoded build id.
pub fn emit_invocation_started(build_id: &str) {
    info!(event = "invocation.started", build_id = %build_id);
}

/// Emit event: status not in the allow-list, nothing dispatched.
pub fn emit_invocation_filtered(build_id: &str, status: &str) {
    info!(event = "invocation.filtered", build_id = %build_id, status = %status);
}

/// Emit event: metadata lookup failed and was treated as absent.
pub fn emit_enrichment_failed(build_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "enrichment.failed", build_id = %build_id, error = %error);
}

/// Emit event: metadata merged into the record.
pub fn emit_enrichment_applied(build_id: &str, keys_written: usize) {
    info!(event = "enrichment.applied", build_id = %build_id, keys_written = keys_written);
}

/// Emit event: primary notification accepted by the messaging channel.
pub fn emit_notification_delivered(build_id: &str, status: &str) {
    info!(event = "notification.delivered", build_id = %build_id, status = %status);
}

/// Emit event: review comment posted.
pub fn emit_comment_posted(build_id: &str, repository: &str, issue_number: u64) {
    info!(
        event = "comment.posted",
        build_id = %build_id,
        repository = %repository,
        issue_number = issue_number,
    );
}

/// Emit event: review comment failed (warning level).
pub fn emit_comment_failed(build_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "comment.failed", build_id = %build_id, error = %error);
}

/// Emit event: invocation finished with duration and outcome.
pub fn emit_invocation_finished(build_id: &str, duration_ms: u64, outcome: &str) {
    info!(
        event = "invocation.finished",
        build_id = %build_id,
        duration_ms = duration_ms,
        outcome = %outcome,
    );
}
