//! Command-line driver: replays NDJSON pings through the risk engine.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::{info, warn};
use pepsafe_engine::clock::{Clock, ManualClock, SystemClock};
use pepsafe_engine::config::{Config, EXAMPLE_CONFIG};
use pepsafe_engine::engine::{IngestOutcome, RiskEngine};
use pepsafe_engine::normalizer::parse_timestamp;
use pepsafe_engine::sample::RawSample;
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed newline-delimited JSON pings through the engine
    Replay {
        /// Input file (stdin when omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Path to configuration file (YAML format)
        #[arg(short = 'C', long)]
        config: Option<String>,

        /// Use the wall clock instead of following ping timestamps
        #[arg(long)]
        wall_clock: bool,

        /// Enable debug output
        #[arg(short, long)]
        debug: bool,
    },
    /// Print an example configuration file
    ExampleConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::ExampleConfig => {
            print!("{EXAMPLE_CONFIG}");
            Ok(())
        }
        Command::Replay {
            input,
            config,
            wall_clock,
            debug,
        } => {
            // Logs go to stderr so stdout stays machine readable
            if debug {
                env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
            } else {
                env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
            }
            replay(input.as_deref(), config.as_deref(), wall_clock)
        }
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::from_file(path).with_context(|| format!("Failed to load config file {path}"))
        }
        None => Config::from_env().context("Invalid configuration in environment"),
    }
}

fn replay(input: Option<&str>, config: Option<&str>, wall_clock: bool) -> Result<()> {
    let config = load_config(config)?;

    // Replays follow the pings' own time so freshness is judged as if live
    let replay_clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let clock: Arc<dyn Clock> = if wall_clock {
        Arc::new(SystemClock)
    } else {
        replay_clock.clone()
    };
    let engine = RiskEngine::with_clock(config, clock)?;

    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input {path}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let (mut scored, mut filtered, mut rejected) = (0usize, 0usize, 0usize);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        let raw = match RawSample::from_json(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Line {line_no}: {e}");
                rejected += 1;
                writeln!(out, "{}", json!({ "line": line_no, "error": e.to_string() }))?;
                continue;
            }
        };

        if !wall_clock {
            if let Some(at) = raw.timestamp.as_ref().and_then(|ts| parse_timestamp(ts).ok()) {
                replay_clock.set(at);
            }
        }

        let record = match engine.ingest(&raw) {
            Ok(IngestOutcome::Scored(snapshot)) => {
                scored += 1;
                json!({
                    "line": line_no,
                    "outcome": "scored",
                    "activity": snapshot.activity.label(),
                    "snapshot": &*snapshot,
                })
            }
            Ok(IngestOutcome::Filtered { identity }) => {
                filtered += 1;
                json!({ "line": line_no, "outcome": "filtered", "identity": identity })
            }
            Err(e) => {
                rejected += 1;
                json!({ "line": line_no, "error": e.to_string() })
            }
        };
        writeln!(out, "{record}")?;
    }

    info!("Replay finished: {scored} scored, {filtered} filtered, {rejected} rejected");

    for identity in engine.identities() {
        match engine.status(&identity) {
            Ok(snapshot) => writeln!(
                out,
                "{}",
                json!({ "activity": snapshot.activity.label(), "status": snapshot })
            )?,
            Err(e) => warn!("No status for {identity}: {e}"),
        }
    }

    out.flush()?;
    Ok(())
}
