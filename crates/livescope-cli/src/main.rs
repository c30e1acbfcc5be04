//! LiveScope demo host
//!
//! Feeds the session store from the simulated source, runs one pause/resume
//! cycle and prints the resulting sessions and channels as JSON.
//!
//! Usage:
//!   livescope [OPTIONS]
//!
//! Options:
//!   --config PATH     JSON configuration file (default: built-in settings)
//!   --run MS          Recording time before and after the pause (default: 1000)
//!   --pause MS        Length of the pause (default: 500)
//!   --precision N     Points per channel in the data summary (default: 200)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use livescope_core::prelude::*;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<String>,
    run_ms: u64,
    pause_ms: u64,
    precision: usize,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            run_ms: 1000,
            pause_ms: 500,
            precision: 200,
        }
    }
}

fn parse_args() -> Result<Option<Args>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut args = Args::default();

    let mut i = 0;
    while i < argv.len() {
        let flag = argv[i].as_str();
        let value = |i: usize| {
            argv.get(i + 1)
                .with_context(|| format!("{flag} needs a value"))
        };
        match flag {
            "--config" | "-c" => {
                args.config = Some(value(i)?.clone());
                i += 1;
            }
            "--run" => {
                args.run_ms = value(i)?.parse().context("--run expects milliseconds")?;
                i += 1;
            }
            "--pause" => {
                args.pause_ms = value(i)?.parse().context("--pause expects milliseconds")?;
                i += 1;
            }
            "--precision" => {
                args.precision = value(i)?.parse().context("--precision expects a count")?;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other => bail!("unknown option {other} (see --help)"),
        }
        i += 1;
    }
    Ok(Some(args))
}

fn print_help() {
    println!("livescope {}", livescope_core::VERSION);
    println!();
    println!("Usage: livescope [--config PATH] [--run MS] [--pause MS] [--precision N]");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => ScopeConfig::load(path)?,
        None => ScopeConfig::default(),
    };
    info!(
        "LiveScope {} at {} Hz with {} simulated channel(s)",
        livescope_core::VERSION,
        config.sample_rate,
        config.simulator.channels.len()
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let server = ScopeServer::with_clock(&config, clock.clone())?;

    let mut source = SimulatedSource::new(
        config.sample_rate,
        config.simulator.channels.clone(),
        clock,
    )
    .with_noise(config.simulator.noise)
    .with_buffer(config.source_buffer);
    if let Some(seed) = config.simulator.seed {
        source = source.with_seed(seed);
    }
    let driver = IngestDriver::spawn(server.clone(), source)?;

    let run = Duration::from_millis(args.run_ms);
    tokio::time::sleep(run).await;
    server.pause();
    tokio::time::sleep(Duration::from_millis(args.pause_ms)).await;
    server.play();
    tokio::time::sleep(run).await;

    let sessions = server.get_sessions(&SessionWindow::All);
    let data = server.get_data(&DataOptions::default().with_precision(args.precision));
    let summary: Vec<_> = data
        .iter()
        .map(|session| {
            json!({
                "id": session.id,
                "start_time": session.start_time,
                "end_time": session.end_time,
                "samples": session.sample_count(),
                "channels": session.data.iter().map(|c| &c.channel).collect::<Vec<_>>(),
            })
        })
        .collect();

    let report = json!({
        "sessions": sessions,
        "channels": server.channels(),
        "data": summary,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    server
        .check_invariants()
        .context("session store is inconsistent")?;

    let stats = driver.stop().await;
    info!(
        "Done: {} batch(es), {} sample(s) ingested",
        stats.batches, stats.samples
    );
    Ok(())
}
