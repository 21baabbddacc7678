use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use toolgate::{
    config::ObservabilityConfig,
    mcp::{build_ide_config, gateway_router, GatewayState, IdeTransport, ToolExecutor},
    observability::{init_stderr_tracing, init_tracing},
    storage::{create_pool, SqlxTenantDirectory},
    Config, APP_NAME, VERSION,
};

#[derive(Parser)]
#[command(name = "toolgate", version, about = "Multi-tenant MCP gateway for configured REST APIs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway server (default)
    Serve,
    /// Generate IDE MCP server configuration, one entry per tenant
    IdeConfig {
        /// Gateway base URL to advertise (defaults to the configured public base URL)
        #[arg(long)]
        base_url: Option<String>,
        /// Transport the generated entries should use
        #[arg(long, value_enum, default_value = "stdio")]
        transport: IdeTransport,
        /// Write the configuration to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; only surface unexpected failures.
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::IdeConfig { base_url, transport, out } => {
            ide_config(base_url, transport, out).await
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    init_tracing(&ObservabilityConfig::from_env())?;

    info!(app_name = APP_NAME, version = VERSION, "Starting Toolgate MCP gateway");

    let config = Config::from_env()?;
    info!(
        bind_address = %config.api.bind_address,
        port = config.api.port,
        request_timeout_s = config.gateway.request_timeout_seconds,
        heartbeat_interval_s = config.gateway.heartbeat_interval_seconds,
        "Loaded configuration from environment"
    );

    let pool = create_pool(&config.database).await?;
    let directory = Arc::new(SqlxTenantDirectory::new(pool));
    let executor = ToolExecutor::new(config.gateway.request_timeout());
    let state = GatewayState::new(directory, executor, config.gateway.heartbeat_interval());

    let addr = format!("{}:{}", config.api.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, gateway_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway shut down");
    Ok(())
}

async fn ide_config(
    base_url: Option<String>,
    transport: IdeTransport,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    // The configuration may go to stdout, so logs go to stderr.
    init_stderr_tracing(&ObservabilityConfig::from_env())?;

    let config = Config::from_env()?;
    let pool = create_pool(&config.database).await?;
    let directory = SqlxTenantDirectory::new(pool);

    let base_url = base_url.unwrap_or_else(|| config.gateway.public_base_url.clone());
    let value = build_ide_config(&directory, &base_url, transport).await?;
    let rendered = serde_json::to_string_pretty(&value)?;

    match out {
        Some(path) => {
            std::fs::write(&path, format!("{}\n", rendered))?;
            info!(path = %path.display(), "Wrote IDE configuration");
        }
        None => println!("{}", rendered),
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
