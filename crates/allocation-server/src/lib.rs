//! # Chat Allocation Server
//!
//! Hosts the allocation engine behind the omnichannel webhooks:
//!
//! - [`api`]: axum router for `/webhook/incoming`, `/webhook/resolved`,
//!   `/health` and diagnostics
//! - [`omnichannel`]: reqwest client used as agent directory and assignment sink
//! - [`config`]: layered configuration (defaults, TOML file, environment)
//! - [`logging`]: tracing subscriber setup

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod omnichannel;

use std::sync::Arc;

use chat_allocation_core::AllocationService;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use api::create_router;
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use omnichannel::OmnichannelClient;

/// Build the allocation service wired to the omnichannel API
pub async fn build_service(config: &ServerConfig) -> Result<Arc<AllocationService>> {
    let client = Arc::new(OmnichannelClient::new(&config.omnichannel)?);
    let service = AllocationService::in_memory(config.allocation(), client.clone(), client).await?;
    Ok(Arc::new(service))
}

/// Serve HTTP and run the dispatch loop until `shutdown` fires.
///
/// The listener stops accepting first; the dispatch loop is then cancelled and
/// joined, so an allocation in progress finishes before this returns.
pub async fn run(
    service: Arc<AllocationService>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<()> {
    let dispatch_cancel = shutdown.child_token();
    let dispatcher = tokio::spawn({
        let service = service.clone();
        let cancel = dispatch_cancel.clone();
        async move { service.run_dispatch_loop(cancel).await }
    });

    info!("🌐 Listening on {}", listener.local_addr()?);
    let served = axum::serve(listener, create_router(service))
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await;

    dispatch_cancel.cancel();
    if let Err(e) = dispatcher.await {
        error!("Dispatch loop task failed: {}", e);
    }

    served?;
    info!("👋 Server stopped");
    Ok(())
}
