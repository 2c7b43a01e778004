//! Webdict RPC Server - JSON-RPC front end for an SRU/FCS dictionary endpoint.
//!
//! Serves explain, scan and searchRetrieve for one dictionary table of a
//! SQLite database.

mod handler;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use webdict_core::{EndpointConfig, SqliteStore, SruEndpoint};

#[derive(Parser, Debug)]
#[command(name = "webdict-rpc")]
#[command(about = "JSON-RPC server for SRU/FCS dictionary search")]
struct Args {
    /// Endpoint configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// SQLite database holding the dictionary tables
    #[arg(long)]
    database: PathBuf,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Webdict RPC Server");

    let config = EndpointConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        "Serving table {} as {} with {} indices",
        config.table,
        config.public_name,
        config.indices.len()
    );

    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("opening {}", args.database.display()))?;

    let endpoint = SruEndpoint::new(store, config).with_host(args.host.clone());
    let addr = server::start_server(endpoint, &args.host, args.port).await?;

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
