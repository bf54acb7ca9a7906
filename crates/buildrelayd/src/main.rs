//! buildrelayd - build event notification relay
//!
//! ## Commands
//!
//! - `run`: relay one event taken from `--event`, `--event-file`, or stdin,
//!   and print the outcome as JSON
//! - `serve`: accept push deliveries on `POST /`

mod server;
mod settings;

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_core::{PushEnvelope, Relay};
use tracing::{info, Level};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "buildrelayd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relay build lifecycle events to a chat channel", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay a single event and print the outcome
    Run {
        /// Base64-encoded event payload
        #[arg(long, conflicts_with = "event_file")]
        event: Option<String>,

        /// File holding the event payload (base64, or a push envelope)
        #[arg(long)]
        event_file: Option<PathBuf>,
    },

    /// Serve the push endpoint
    Serve {
        /// Address to listen on
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    relay_core::init_tracing(cli.json, level);

    let relay = cli.settings.build_relay()?;
    info!(
        version = relay_core::VERSION,
        project = %relay.config().project_id,
        statuses = %relay.config().statuses,
        "buildrelayd configured"
    );

    match cli.command {
        Commands::Run { event, event_file } => {
            cmd_run(&relay, event, event_file.as_deref()).await
        }
        Commands::Serve { bind } => server::serve(relay, bind).await,
    }
}

async fn cmd_run(relay: &Relay, event: Option<String>, event_file: Option<&Path>) -> Result<()> {
    let input = read_input(event, event_file)?;
    let payload = event_payload(input)?;

    let outcome = relay
        .handle(&payload)
        .await
        .context("Failed to relay build event")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn read_input(event: Option<String>, event_file: Option<&Path>) -> Result<Vec<u8>> {
    if let Some(event) = event {
        return Ok(event.into_bytes());
    }
    if let Some(path) = event_file {
        return std::fs::read(path)
            .with_context(|| format!("Failed to read event file {}", path.display()));
    }

    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read event from stdin")?;
    Ok(buf)
}

/// Unwrap a push envelope if given one; base64 payloads pass through.
fn event_payload(input: Vec<u8>) -> Result<Vec<u8>> {
    if input.trim_ascii_start().starts_with(b"{") {
        let envelope = PushEnvelope::parse(&input)?;
        return Ok(envelope.payload().to_vec());
    }
    Ok(input)
}
