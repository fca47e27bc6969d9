use std::sync::Arc;

use clap::Parser;

use wabridge_server::ServerConfig;
use wabridge_session::{MockConnector, SessionConnector};

#[derive(Debug, Parser)]
#[command(name = "wabridge", about = "Bridge a messaging account to local WebSocket subscribers")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 10010)]
    port: u16,

    /// Remote handshake window in seconds.
    #[arg(long, default_value_t = 600)]
    login_timeout_secs: u64,

    /// Per-subscriber outbound queue depth before drop-and-disconnect.
    #[arg(long, default_value_t = 256)]
    max_send_queue: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // No real remote-protocol client is linked into this build; the mock
    // transport pairs instantly and echoes sends back as inbound traffic.
    tracing::warn!("Using the mock session transport");
    let connector: Arc<dyn SessionConnector> = Arc::new(MockConnector::echoing());

    let config = ServerConfig {
        port: args.port,
        max_send_queue: args.max_send_queue,
        login_timeout_secs: args.login_timeout_secs,
    };

    let handle = wabridge_server::start(config, connector).await?;
    tracing::info!(port = handle.port, "wabridge ready");

    tokio::signal::ctrl_c().await?;

    handle.state.hub.close();
    handle.state.registry.clear().await;
    tracing::info!("Shutting down");
    Ok(())
}
