//! Foresight offline host sampler
//!
//! Records timestamped CPU/RAM/process-table snapshots of the local host for
//! a bounded duration and writes them to a JSON file. This is a standalone
//! data-collection utility; the forecasting service does not consume its
//! output at runtime.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use serde::Serialize;
use sysinfo::System;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Foresight sampler command line interface
#[derive(Parser)]
#[command(name = "foresight-sampler")]
#[command(about = "Record host CPU/RAM/process snapshots to a JSON file")]
#[command(version = "0.1.0")]
struct Cli {
    /// Total sampling duration in seconds
    #[arg(short, long, default_value_t = 30)]
    duration: u64,

    /// Seconds between snapshots
    #[arg(short, long, default_value_t = 1)]
    interval: u64,

    /// Output file path
    #[arg(short, long, default_value = "performance_data.json")]
    output: PathBuf,

    /// Number of top-CPU processes to record per snapshot
    #[arg(short, long, default_value_t = 15)]
    top: usize,
}

/// One recorded host snapshot
#[derive(Debug, Serialize)]
struct Snapshot {
    timestamp: String,
    cpu_usage: f64,
    ram_usage: f64,
    processes: Vec<ProcessSnapshot>,
}

/// One process-table entry, heaviest CPU consumers first
#[derive(Debug, Serialize)]
struct ProcessSnapshot {
    pid: u32,
    name: String,
    cpu: f64,
    memory: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!(
        "Sampling host for {}s every {}s into {}",
        cli.duration,
        cli.interval,
        cli.output.display()
    );

    let snapshots = collect(cli.duration, cli.interval, cli.top).await;

    let json = serde_json::to_string_pretty(&snapshots)?;
    std::fs::write(&cli.output, json)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    info!("Recorded {} snapshots to {}", snapshots.len(), cli.output.display());
    Ok(())
}

/// Collect snapshots for `duration` seconds at the given interval.
async fn collect(duration: u64, interval_secs: u64, top: usize) -> Vec<Snapshot> {
    let mut system = System::new_all();
    // CPU usage is a delta between refreshes; prime the counters so the
    // first recorded tick carries a real value.
    system.refresh_all();

    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let count = (duration / interval_secs.max(1)).max(1) as usize;
    let mut snapshots = Vec::with_capacity(count);

    for _ in 0..count {
        ticker.tick().await;
        snapshots.push(capture(&mut system, top));
    }

    snapshots
}

/// Refresh the system tables and capture one snapshot.
fn capture(system: &mut System, top: usize) -> Snapshot {
    system.refresh_cpu();
    system.refresh_memory();
    system.refresh_processes();

    let total_memory = system.total_memory();
    let ram_usage = if total_memory > 0 {
        system.used_memory() as f64 / total_memory as f64 * 100.0
    } else {
        0.0
    };

    let mut processes: Vec<ProcessSnapshot> = system
        .processes()
        .iter()
        .map(|(pid, process)| ProcessSnapshot {
            pid: pid.as_u32(),
            name: process.name().to_string(),
            cpu: process.cpu_usage() as f64,
            memory: if total_memory > 0 {
                process.memory() as f64 / total_memory as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    processes.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    processes.truncate(top);

    Snapshot {
        timestamp: Local::now().to_rfc3339(),
        cpu_usage: system.global_cpu_info().cpu_usage() as f64,
        ram_usage,
        processes,
    }
}
