//! rebrokerd: the remote environment broker daemon.
//!
//! # Usage
//!
//! ```text
//! rebrokerd standalone --port 8080 --data-dir /var/lib/rebroker --config broker.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use rebrokerd::{BrokerFileConfig, assemble};

#[derive(Parser)]
#[command(name = "rebrokerd", about = "Remote environment broker daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the broker with an embedded store and in-memory cluster.
    Standalone {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/rebroker")]
        data_dir: PathBuf,

        /// Broker configuration file; defaults apply when it is missing.
        #[arg(long, default_value = "broker.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,rebrokerd=debug,rebroker=debug"))?,
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            port,
            data_dir,
            config,
        } => run_standalone(port, data_dir, config).await,
    }
}

async fn run_standalone(port: u16, data_dir: PathBuf, config: PathBuf) -> anyhow::Result<()> {
    info!("remote environment broker starting in standalone mode");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("rebroker.redb");

    let store = rebroker_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let config = BrokerFileConfig::load(Some(&config))?;
    let assembled = assemble(&config, store)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "OSB API starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, assembled.router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("remote environment broker stopped");
    Ok(())
}
