//! Schema Server - serves schema lookups over JSON-RPC.
//!
//! Loads every schema named in the config file, then serves until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use schema_core::{JsonSchemaParser, SchemaRegistry, ServerConfig};
use schema_rpc::SchemaServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "schema-server")]
#[command(about = "JSON-RPC server for schema lookups")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    if args.json_logs {
        FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_target(false)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    info!("Starting schema server");

    let config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let registry = SchemaRegistry::load(&config.schemas, &JsonSchemaParser::new())
        .context("loading schemas")?;
    info!("Loaded {} schemas", registry.len());

    let server = SchemaServer::new(&config, Arc::new(registry)).await?;
    let bound = server.bind().await?;

    // Stdout carries only the bound address, for supervising processes.
    println!("RPC_ADDR={}", bound.local_addr());
    if let Some(addr) = bound.metrics_addr() {
        println!("METRICS_ADDR={}", addr);
    }

    let handle = bound.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                handle.stop();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    bound.run().await?;
    Ok(())
}
