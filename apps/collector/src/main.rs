//! Marketfeed collector.
//!
//! Commands:
//! - `serve` (default): run the collection schedule until Ctrl-C
//! - `run <task>`: run one task now and print its summary as JSON
//! - `migrate`: apply pending database migrations

mod config;
mod main_lib;
mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use marketfeed_core::TaskKind;
use tokio::sync::watch;

use config::Config;
use main_lib::{build_scheduler, build_state, init_tracing, open_database};

#[derive(Parser)]
#[command(
    name = "marketfeed-collector",
    about = "Collects stock prices on the exchange schedule"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collection schedule until interrupted.
    Serve,
    /// Run a single task now.
    Run {
        /// Task id (1-4) or name (metadata, opening, closing, intraday).
        task: TaskKind,

        /// Run even when the calendar says it is not a trading moment.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await,
        Commands::Run { task, force } => run_once(&config, task, force).await,
        Commands::Migrate => {
            let (_, applied) = open_database(&config)?;
            println!("Applied {} migration(s)", applied.len());
            Ok(())
        }
    }
}

async fn serve(config: &Config) -> Result<()> {
    let state = build_state(config).await?;
    state
        .store
        .ping()
        .await
        .with_context(|| format!("database {} is not reachable", state.db_path))?;

    let scheduler = Arc::new(build_scheduler(&state, config)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = scheduler::start_collection_scheduler(scheduler, shutdown_rx);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("Shutdown requested");
        }
        joined = &mut handle => {
            joined.context("collection scheduler failed")?;
            return Ok(());
        }
    }

    let _ = shutdown_tx.send(true);
    handle.await.context("collection scheduler failed")?;
    Ok(())
}

async fn run_once(config: &Config, task: TaskKind, force: bool) -> Result<()> {
    let state = build_state(config).await?;
    let summary = state.runner.run(task, Utc::now(), force).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
