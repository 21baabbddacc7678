//! Toolgate stdio bridge.
//!
//! A local adapter process that reads newline-terminated JSON-RPC requests
//! from stdin, forwards them to a Toolgate gateway's synchronous RPC
//! endpoint, and writes newline-terminated responses to stdout. Replies
//! arrive in completion order; correlate by id. Exits on stdin EOF or an
//! interrupt/terminate signal with no pending-request drain guarantee.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use toolgate::config::ObservabilityConfig;
use toolgate::mcp::StdioBridge;
use toolgate::observability::init_stderr_tracing;

#[derive(Parser)]
#[command(
    name = "toolgate-stdio",
    version,
    about = "Stdio bridge forwarding MCP JSON-RPC to a Toolgate gateway"
)]
struct Args {
    /// Tenant id or slug to serve
    #[arg(long, env = "TOOLGATE_TENANT")]
    tenant: String,

    /// Base URL of the gateway the bridge forwards to
    #[arg(long, env = "TOOLGATE_ENDPOINT", default_value = "http://127.0.0.1:8080")]
    endpoint: String,

    /// Forwarding timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout is the reply channel; all logging goes to stderr.
    init_stderr_tracing(&ObservabilityConfig::from_env())?;

    let bridge = StdioBridge::new(
        &args.endpoint,
        &args.tenant,
        Duration::from_secs(args.timeout_seconds),
    );
    info!(endpoint = %bridge.endpoint(), "Starting stdio bridge");

    let run = bridge.run(tokio::io::stdin(), tokio::io::stdout());
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            result?;
            info!("Input stream closed, exiting");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, exiting");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
