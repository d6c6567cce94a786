//! stewardctl - CLI entry point
//!
//! Snapshots and updates every running container, and audits the host's
//! backup task history.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use steward_common::StewardConfig;
use stewardctl::commands;
use stewardctl::exit_codes;
use stewardctl::runtime::HostRuntime;
use stewardctl::PveHost;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stewardctl")]
#[command(about = "Snapshot-then-update for Proxmox containers, plus backup auditing", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default /etc/pve-steward/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot and update running containers
    Update {
        /// Only this container ID
        #[arg(long)]
        ct: Option<u32>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Audit recent backup tasks
    Audit {
        /// Lookback window in days
        #[arg(long, allow_negative_numbers = true)]
        days: Option<i64>,

        /// Node to query (default: local hostname)
        #[arg(long)]
        node: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Update, then audit backups
    Maintain {
        #[arg(long)]
        ct: Option<u32>,

        #[arg(long, allow_negative_numbers = true)]
        days: Option<i64>,

        #[arg(long)]
        node: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let config = StewardConfig::load(cli.config.as_deref())?;
    let host: Arc<dyn HostRuntime> = Arc::new(PveHost::new(&config.storage.storage_cfg_path));

    match cli.command {
        Commands::Update { ct, json } => commands::run_update(host, &config, ct, json).await,
        Commands::Audit { days, node, json } => {
            commands::run_audit(host, &config, days, node.as_deref(), json).await
        }
        Commands::Maintain { ct, days, node, json } => {
            commands::run_maintain(host, &config, ct, days, node.as_deref(), json).await
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Dropping the run future kills any child process still attached to it
    let code = tokio::select! {
        result = dispatch(cli) => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("[ERROR] {:#}", e);
                exit_codes::for_error(&e)
            }
        },
        _ = shutdown_signal() => {
            warn!("Interrupted, abandoning run without a report");
            exit_codes::EXIT_INTERRUPTED
        }
    };

    std::process::exit(code);
}
