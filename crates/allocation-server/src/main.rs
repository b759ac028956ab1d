use std::path::PathBuf;

use chat_allocation_server::logging::{log_welcome, setup_logging};
use chat_allocation_server::{build_service, run, ServerConfig};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Allocates waiting omnichannel chat rooms to agents
#[derive(Parser, Debug)]
#[command(name = "allocation-server", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides http.bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.http.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    config.validate()?;

    setup_logging(&config.logging)?;
    log_welcome("allocation-server", env!("CARGO_PKG_VERSION"));

    let service = build_service(&config).await?;
    let listener = TcpListener::bind(config.bind_address()?).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 Ctrl-C received, shutting down");
                    shutdown.cancel();
                }
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    });

    run(service, listener, shutdown).await?;
    Ok(())
}
