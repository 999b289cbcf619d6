//! steward — run health probes and file watches from the command line.
//!
//! # Usage
//!
//! ```text
//! steward probe 127.0.0.1:6379 --interval 5s --retry 1s --down 3
//! steward probe db.internal:5432 --config probe.toml
//! steward watch /etc/app/config.toml /etc/app/cert.pem --interval 2s
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use steward_core::parse_duration;
use steward_scheduler::Scheduler;

mod probe;
mod watch;

#[derive(Parser)]
#[command(name = "steward", about = "Interval health probes and file watches", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe a TCP address and report up/down transitions.
    Probe {
        /// Address to connect to (host:port).
        address: String,

        /// Interval between probes.
        #[arg(long, default_value = "5s", value_parser = parse_duration)]
        interval: Duration,

        /// Retry interval after a failed probe.
        #[arg(long, default_value = "1s", value_parser = parse_duration)]
        retry: Duration,

        /// Connect timeout per probe.
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        timeout: Duration,

        /// Consecutive successes before reporting up.
        #[arg(long, default_value = "1")]
        up: u32,

        /// Consecutive failures before reporting down.
        #[arg(long, default_value = "3")]
        down: u32,

        /// Let the first probe set the state directly.
        #[arg(long)]
        fast_start: bool,

        /// TOML file with [schedule] and [health] tables; overrides flags.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Report changes to files.
    Watch {
        /// Files to watch.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Interval between polls.
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        interval: Duration,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,steward=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let scheduler = match cli.command {
        Command::Probe {
            address,
            interval,
            retry,
            timeout,
            up,
            down,
            fast_start,
            config,
        } => {
            let settings = match config {
                Some(path) => probe::ProbeSettings::from_file(&path)?,
                None => probe::ProbeSettings::from_flags(interval, retry, up, down, fast_start),
            };
            probe::scheduler(address, timeout, &settings)?
        }
        Command::Watch { files, interval } => watch::scheduler(files, interval),
    };

    run_until_ctrl_c(scheduler).await
}

async fn run_until_ctrl_c(scheduler: Scheduler) -> anyhow::Result<()> {
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.stop();
    scheduler.join().await;
    info!("steward stopped");
    Ok(())
}
