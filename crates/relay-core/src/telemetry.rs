//! Tracing setup for buildrelay binaries.
//!
//! The relay's own crates log at the requested level while dependencies
//! (hyper, reqwest, rustls) stay at `warn`. `RUST_LOG` replaces the default
//! filter entirely.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested level.
const RELAY_TARGETS: &[&str] = &["relay_core", "relay_ports", "relay_http", "buildrelayd"];

/// Default filter directives for `level`, e.g. `warn,relay_core=info,...`.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(RELAY_TARGETS.iter().map(|target| format!("{}={}", target, level)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Later calls are no-ops.
///
/// `json` switches to newline-delimited JSON for log collectors.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().with_target(false).json().flatten_event(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    if installed.is_ok() {
        tracing::debug!(level = %level, json, "tracing initialised");
    }
}
