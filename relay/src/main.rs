//! Tether relay
//!
//! A self-hosted row backend for development and testing. Speaks the REST
//! row dialect the sync engine's remote adapter uses and keeps every row in
//! memory, so nothing survives a restart.
//!
//! Usage:
//!   tether-relay --port 8787 --api-key dev-key

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tether_relay::{build_router, RelayState};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tether-relay")]
#[command(about = "In-memory row backend for the tether sync engine")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8787")]
    port: u16,

    /// API key clients must send in the `apikey` header
    #[arg(short = 'k', long, default_value = "dev-key")]
    api_key: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let state = Arc::new(RelayState::new(args.api_key));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!("\n========================================");
    println!("  Tether Relay Running");
    println!("========================================");
    println!("  Rows:   http://localhost:{}/rest/v1/<table>", args.port);
    println!("  Health: http://localhost:{}/health", args.port);
    println!("========================================\n");

    info!(port = args.port, "Relay listening");
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
