//! rulegate HTTP server
//!
//! Serves decision and flow artifacts loaded from a directory of
//! WebAssembly modules. Modules dropped into the artifacts directory are
//! picked up on the next execution; the reload routes rescan on demand.
//!
//! Usage:
//!   rulegate-server --port 8080 --artifacts-dir ./artifacts

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use rulegate_executor::{ExecutionOrchestrator, ExecutorConfig};
use rulegate_server::build_router;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rulegate-server")]
#[command(about = "Executes decision and flow artifacts over HTTP")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default artifacts directory (overrides the config file)
    #[arg(short, long)]
    artifacts_dir: Option<PathBuf>,

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

    info!("rulegate starting...");
    let mut config = ExecutorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.artifacts_dir {
        config.artifacts_location = dir;
    }

    let orchestrator = Arc::new(
        ExecutionOrchestrator::from_config(&config).context("Failed to create artifact runtime")?,
    );
    match orchestrator.reload_default(false) {
        Ok(message) => info!("{}", message),
        Err(e) => warn!("No artifacts loaded at startup: {}", e),
    }

    let app = build_router(Arc::clone(&orchestrator));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.port))?;
    info!("HTTP API listening on port {}", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    orchestrator.shutdown();
    info!("rulegate stopped");
    Ok(())
}
