//! Switchboard replay binary.
//!
//! # Usage
//!
//! ```bash
//! # Render the first call and thread found in the log
//! switchboard-replay --events session.json --user 8:acs:alice
//!
//! # Focus a specific call, pretty-printed, with reducer logs
//! switchboard-replay --events session.json --user 8:acs:alice --call c1 --pretty \
//!     --log-level debug
//! ```

use std::{
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use clap::Parser;
use switchboard_core::{CallId, CommunicationIdentifier, ThreadId};
use switchboard_replay::{ReplayConfig, ReplayError, read_events, replay};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Switchboard event log replay
#[derive(Parser, Debug)]
#[command(name = "switchboard-replay")]
#[command(about = "Replay a switchboard event log and print the rendered view-models")]
#[command(version)]
struct Args {
    /// Path to the event log (JSON array of events)
    #[arg(short, long)]
    events: PathBuf,

    /// Raw id of the local user the log was captured for
    #[arg(short, long)]
    user: String,

    /// Local display name
    #[arg(long)]
    display_name: Option<String>,

    /// Call to render (defaults to the first call in the log)
    #[arg(short, long)]
    call: Option<String>,

    /// Chat thread to render (defaults to the first thread in the log)
    #[arg(short, long)]
    thread: Option<String>,

    /// Render time for typing indicators, RFC 3339 (defaults to now)
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let user = CommunicationIdentifier::from_raw_id(&args.user).map_err(ReplayError::from)?;
    let config = ReplayConfig {
        user,
        display_name: args.display_name,
        call_id: args.call.map(CallId::new),
        thread_id: args.thread.map(ThreadId::new),
        now: args.now.unwrap_or_else(Utc::now),
    };

    tracing::info!("Reading events from {}", args.events.display());
    let file = File::open(&args.events).map_err(ReplayError::from)?;
    let events = read_events(BufReader::new(file))?;

    let report = replay(config, events);
    if report.call.is_none() && report.thread.is_none() {
        tracing::warn!("Log contains no call or thread to render");
    }

    let encoded = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .map_err(ReplayError::from)?;

    let mut out = io::stdout().lock();
    writeln!(out, "{encoded}").map_err(ReplayError::from)?;

    Ok(())
}
